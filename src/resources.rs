use std::io::{BufReader, Cursor};

use cfg_if::cfg_if;
use serde::Deserialize;

use crate::{error::LoadError, model::ModelVertex, texture::PendingImage};

/// Specular reflectance and shininess for meshes whose format has none
const DEFAULT_SPECULAR: [f32; 3] = [1.0, 1.0, 1.0];
const DEFAULT_SHININESS: f32 = 35.0;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> Result<reqwest::Url, LoadError> {
    let fail = |reason: String| LoadError::Fetch {
        url: file_name.to_string(),
        reason,
    };
    let origin = web_sys::window()
        .ok_or_else(|| fail("no window".to_string()))?
        .location()
        .origin()
        .map_err(|_| fail("no page origin".to_string()))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))
        .map_err(|err| fail(err.to_string()))?;
    base.join(file_name).map_err(|err| fail(err.to_string()))
}

/// Files named by an existing path are used as is, everything else is
/// looked up in the assets folder the build script copies next to the build
#[cfg(not(target_arch = "wasm32"))]
pub fn asset_path(file_name: &str) -> std::path::PathBuf {
    let direct = std::path::Path::new(file_name);
    if direct.exists() {
        return direct.to_path_buf();
    }
    std::path::Path::new(env!("OUT_DIR"))
        .join("assets")
        .join(file_name)
}

pub async fn load_string(file_name: &str) -> Result<String, LoadError> {
    cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            let url = format_url(file_name)?;
            let fail = |err: reqwest::Error| LoadError::Fetch {
                url: file_name.to_string(),
                reason: err.to_string(),
            };
            let txt = reqwest::get(url)
                .await
                .map_err(fail)?
                .text()
                .await
                .map_err(fail)?;
        } else {
            let path = asset_path(file_name);
            let txt = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
    }

    Ok(txt)
}

pub async fn load_binary(file_name: &str) -> Result<Vec<u8>, LoadError> {
    cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            let url = format_url(file_name)?;
            let fail = |err: reqwest::Error| LoadError::Fetch {
                url: file_name.to_string(),
                reason: err.to_string(),
            };
            let data = reqwest::get(url)
                .await
                .map_err(fail)?
                .bytes()
                .await
                .map_err(fail)?
                .to_vec();
        } else {
            let path = asset_path(file_name);
            let data = std::fs::read(&path).map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
    }

    Ok(data)
}

pub fn decode_image(file_name: &str, bytes: &[u8]) -> Result<image::DynamicImage, LoadError> {
    image::load_from_memory(bytes).map_err(|source| LoadError::Image {
        name: file_name.to_string(),
        source,
    })
}

/// Start fetching and decoding an image off the render path. The render loop
/// polls the returned handle once per frame.
pub fn load_image_in_background(file_name: &str) -> PendingImage {
    let (pending, sender) = PendingImage::new(file_name);
    let name = file_name.to_string();

    let load = async move {
        let result = match load_binary(&name).await {
            Ok(bytes) => decode_image(&name, &bytes),
            Err(err) => Err(err),
        };
        // The model may already be gone, in which case nobody wants the image
        let _ = sender.send(result);
    };

    cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            wasm_bindgen_futures::spawn_local(load);
        } else {
            std::thread::spawn(move || pollster::block_on(load));
        }
    }

    pending
}

/// JSON mesh format: a list of faces, each drawn as a triangle strip
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshDescription {
    pub faces: Vec<FaceDescription>,
    #[serde(rename = "textureURL", default)]
    pub texture_url: Option<String>,
    #[serde(default)]
    pub use_backface_cull: bool,
    // One WGSL program draws every model, so these are read and ignored
    #[serde(default)]
    pub vertex_shader: Option<String>,
    #[serde(default)]
    pub fragment_shader: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDescription {
    pub vertex_coords: Vec<[f32; 3]>,
    pub vertex_normals: Vec<[f32; 3]>,
    pub vertex_colors: Vec<[f32; 3]>,
    pub vertex_specular: Vec<[f32; 3]>,
    pub vertex_shininess: Vec<f32>,
    #[serde(default)]
    pub vertex_tex_coords: Option<Vec<[f32; 2]>>,
}

/// Mesh ready for upload: a flat triangle list plus material hints
#[derive(Debug, Clone)]
pub struct MeshData {
    pub vertices: Vec<ModelVertex>,
    pub texture_url: Option<String>,
    pub backface_cull: bool,
    /// Slide the texture along `s` and `t` every frame
    pub scroll_texture: bool,
}

pub fn parse_json_mesh(name: &str, text: &str) -> Result<MeshData, LoadError> {
    let description: MeshDescription =
        serde_json::from_str(text).map_err(|source| LoadError::Json {
            name: name.to_string(),
            source,
        })?;

    let mut vertices = Vec::new();
    let mut has_tex_coords = false;

    for (index, face) in description.faces.iter().enumerate() {
        let count = face.vertex_coords.len();
        let tex_coords_ok = face
            .vertex_tex_coords
            .as_ref()
            .map_or(true, |tc| tc.len() == count);
        if face.vertex_normals.len() != count
            || face.vertex_colors.len() != count
            || face.vertex_specular.len() != count
            || face.vertex_shininess.len() != count
            || !tex_coords_ok
        {
            return Err(LoadError::MalformedFace {
                model: name.to_string(),
                face: index,
            });
        }
        has_tex_coords |= face.vertex_tex_coords.is_some();

        let strip: Vec<ModelVertex> = (0..count)
            .map(|j| ModelVertex {
                position: face.vertex_coords[j],
                normal: face.vertex_normals[j],
                color: face.vertex_colors[j],
                specular: face.vertex_specular[j],
                shininess: face.vertex_shininess[j],
                tex_coords: face
                    .vertex_tex_coords
                    .as_ref()
                    .map_or([0.0, 0.0], |tc| tc[j]),
            })
            .collect();
        vertices.extend(strip_to_list(&strip));
    }

    // A texture without coordinates to sample it with is useless
    let texture_url = description.texture_url.filter(|_| has_tex_coords);

    log::debug!(
        "Parsed mesh '{}': {} faces, {} triangles",
        name,
        description.faces.len(),
        vertices.len() / 3
    );

    Ok(MeshData {
        vertices,
        texture_url,
        backface_cull: description.use_backface_cull,
        scroll_texture: true,
    })
}

/// Expand a triangle strip into a triangle list. Every other triangle of a
/// strip is wound the opposite way, so those get two vertices swapped.
pub fn strip_to_list<T: Copy>(strip: &[T]) -> Vec<T> {
    if strip.len() < 3 {
        return Vec::new();
    }
    let mut list = Vec::with_capacity((strip.len() - 2) * 3);
    for k in 0..strip.len() - 2 {
        if k % 2 == 0 {
            list.extend_from_slice(&[strip[k], strip[k + 1], strip[k + 2]]);
        } else {
            list.extend_from_slice(&[strip[k + 1], strip[k], strip[k + 2]]);
        }
    }
    list
}

pub async fn load_json_mesh(file_name: &str) -> Result<MeshData, LoadError> {
    let text = load_string(file_name).await?;
    parse_json_mesh(file_name, &text)
}

/// Load a Wavefront OBJ (and its MTL, when there is one) into a triangle list
pub async fn load_obj_mesh(file_name: &str) -> Result<MeshData, LoadError> {
    let obj_text = load_string(file_name).await?;
    let obj_cursor = Cursor::new(obj_text);
    let mut obj_reader = BufReader::new(obj_cursor);

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| async move {
            match load_string(&p).await {
                Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                Err(_) => Err(tobj::LoadError::OpenFileFailed),
            }
        },
    )
    .await
    .map_err(|source| LoadError::Obj {
        name: file_name.to_string(),
        source,
    })?;

    let materials = obj_materials.unwrap_or_else(|err| {
        log::warn!("No materials for '{}': {}", file_name, err);
        Vec::new()
    });

    let mut vertices = Vec::new();
    let mut has_tex_coords = false;
    for m in &models {
        let mesh = &m.mesh;
        let material = mesh.material_id.and_then(|id| materials.get(id));
        let color = material.map_or([1.0, 1.0, 1.0], |mat| mat.diffuse);
        let specular = material.map_or(DEFAULT_SPECULAR, |mat| mat.specular);
        let shininess = material
            .map(|mat| mat.shininess)
            .filter(|&s| s > 0.0)
            .unwrap_or(DEFAULT_SHININESS);
        has_tex_coords |= !mesh.texcoords.is_empty();

        for &index in &mesh.indices {
            let i = index as usize;
            let position = [
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                mesh.positions[i * 3 + 2],
            ];
            let normal = if mesh.normals.len() >= i * 3 + 3 {
                [mesh.normals[i * 3], mesh.normals[i * 3 + 1], mesh.normals[i * 3 + 2]]
            } else {
                [0.0, 0.0, 1.0]
            };
            let tex_coords = if mesh.texcoords.len() >= i * 2 + 2 {
                // OBJ puts v = 0 at the bottom of the image
                [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
            } else {
                [0.0, 0.0]
            };
            vertices.push(ModelVertex {
                position,
                normal,
                color,
                specular,
                shininess,
                tex_coords,
            });
        }
    }

    let texture_url = materials
        .iter()
        .map(|mat| mat.diffuse_texture.clone())
        .find(|texture| !texture.is_empty())
        .filter(|_| has_tex_coords);

    log::debug!(
        "Loaded OBJ '{}': {} meshes, {} triangles",
        file_name,
        models.len(),
        vertices.len() / 3
    );

    Ok(MeshData {
        vertices,
        texture_url,
        backface_cull: true,
        scroll_texture: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = r#"{
        "faces": [{
            "vertexCoords": [[0,0,0],[1,0,0],[0,1,0],[1,1,0]],
            "vertexNormals": [[0,0,1],[0,0,1],[0,0,1],[0,0,1]],
            "vertexColors": [[1,0,0],[0,1,0],[0,0,1],[1,1,1]],
            "vertexSpecular": [[1,1,1],[1,1,1],[1,1,1],[1,1,1]],
            "vertexShininess": [10,10,10,10],
            "vertexTexCoords": [[0,0],[1,0],[0,1],[1,1]]
        }],
        "textureURL": "checker.png",
        "useBackfaceCull": true,
        "vertexShader": "ignored.glsl"
    }"#;

    #[test]
    fn strip_expands_with_alternating_winding() {
        assert_eq!(strip_to_list(&[0, 1, 2, 3, 4]), vec![0, 1, 2, 2, 1, 3, 2, 3, 4]);
        assert!(strip_to_list(&[0, 1]).is_empty());
    }

    #[test]
    fn json_quad_becomes_two_triangles() {
        let mesh = parse_json_mesh("quad.json", QUAD).unwrap();
        assert_eq!(mesh.vertices.len(), 6);
        assert!(mesh.backface_cull);
        assert_eq!(mesh.texture_url.as_deref(), Some("checker.png"));
        // Second triangle is (2,1,3) so it winds the same way as the first
        assert_eq!(mesh.vertices[3].position, [0.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[4].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[5].tex_coords, [1.0, 1.0]);
        assert_eq!(mesh.vertices[0].shininess, 10.0);
        assert!(mesh.scroll_texture);
    }

    #[test]
    fn texture_needs_tex_coords() {
        let text = QUAD.replace(r#""vertexTexCoords": [[0,0],[1,0],[0,1],[1,1]]"#, r#""extra": 0"#);
        let mesh = parse_json_mesh("quad.json", &text).unwrap();
        assert!(mesh.texture_url.is_none());
        assert_eq!(mesh.vertices[0].tex_coords, [0.0, 0.0]);
    }

    #[test]
    fn mismatched_face_arrays_are_rejected() {
        let text = QUAD.replace("[10,10,10,10]", "[10,10,10]");
        match parse_json_mesh("quad.json", &text) {
            Err(LoadError::MalformedFace { model, face }) => {
                assert_eq!(model, "quad.json");
                assert_eq!(face, 0);
            }
            other => panic!("expected MalformedFace, got {:?}", other.map(|m| m.vertices.len())),
        }
    }

    #[test]
    fn backface_cull_defaults_off() {
        let text = QUAD.replace(r#""useBackfaceCull": true,"#, "");
        let mesh = parse_json_mesh("quad.json", &text).unwrap();
        assert!(!mesh.backface_cull);
    }

    #[test]
    fn invalid_json_reports_parse_error() {
        assert!(matches!(
            parse_json_mesh("broken.json", "{ faces: "),
            Err(LoadError::Json { .. })
        ));
    }

    #[test]
    fn loads_json_mesh_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.json");
        std::fs::write(&path, QUAD).unwrap();

        let mesh = pollster::block_on(load_json_mesh(path.to_str().unwrap())).unwrap();
        assert_eq!(mesh.vertices.len(), 6);
    }

    #[test]
    fn loads_obj_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        std::fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1/1 2/2/1 3/3/1\n",
        )
        .unwrap();

        let mesh = pollster::block_on(load_obj_mesh(path.to_str().unwrap())).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[2].tex_coords, [0.0, 0.0]);
        assert_eq!(mesh.vertices[0].shininess, DEFAULT_SHININESS);
        assert!(mesh.texture_url.is_none());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = pollster::block_on(load_string("definitely/not/here.json"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn bundled_cube_has_twelve_triangles() {
        let mesh = parse_json_mesh("cube.json", include_str!("../assets/cube.json")).unwrap();
        assert_eq!(mesh.vertices.len(), 36);
        assert!(mesh.backface_cull);

        // Strip expansion keeps every triangle facing out
        for tri in mesh.vertices.chunks(3) {
            let [a, b, c] = [tri[0].position, tri[1].position, tri[2].position];
            let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let face_normal = [
                ab[1] * ac[2] - ab[2] * ac[1],
                ab[2] * ac[0] - ab[0] * ac[2],
                ab[0] * ac[1] - ab[1] * ac[0],
            ];
            let n = tri[0].normal;
            let facing = face_normal[0] * n[0] + face_normal[1] * n[1] + face_normal[2] * n[2];
            assert!(facing > 0.0);
        }
    }
}
