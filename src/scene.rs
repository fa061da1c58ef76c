//! Scene description and the per-frame placement resolver.
//!
//! The description is what the scene file says and is never changed after
//! loading. [`Scene`] holds the live copy: one [`PlacedInstance`] per entry,
//! whose orbiting locations move a little every frame.

use cgmath::{prelude::*, Deg, Matrix4, Point3, Vector3};
use serde::Deserialize;

use crate::{
    camera::CameraDescription,
    error::{LoadError, SceneError},
    light::{Light, ViewLight, MAX_LIGHTS},
    model::{DrawList, ModelId, ModelRegistry, TextureOptions},
    resources,
    transform_stack::TransformStack,
};

/// Axes shorter than this are treated as degenerate
const MIN_AXIS_LENGTH: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneDescription {
    pub camera: CameraDescription,
    #[serde(default)]
    pub lights: Vec<Light>,
    #[serde(default)]
    pub models: Vec<ModelPlacement>,
    #[serde(rename = "bgColor", default)]
    pub bg_color: Option<[f32; 4]>,
}

/// A scale factor, either the same on every axis or one per axis
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scale {
    Uniform(f32),
    PerAxis([f32; 3]),
}

impl Scale {
    pub fn matrix(&self) -> Matrix4<f32> {
        match *self {
            Scale::Uniform(s) => Matrix4::from_scale(s),
            Scale::PerAxis([x, y, z]) => Matrix4::from_nonuniform_scale(x, y, z),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPlacement {
    #[serde(rename = "modelURL")]
    pub model_url: String,
    pub scale: Scale,
    pub location: [f32; 3],
    pub x_basis: [f32; 3],
    pub y_basis: [f32; 3],
    pub z_basis: [f32; 3],
    #[serde(default)]
    pub parent: Option<usize>,
    /// Orbit rate in degrees per frame
    #[serde(default)]
    pub speed: Option<f32>,
}

pub fn parse_scene(name: &str, text: &str) -> Result<SceneDescription, LoadError> {
    serde_json::from_str(text).map_err(|source| LoadError::Json {
        name: name.to_string(),
        source,
    })
}

/// Read, parse and validate a scene file
pub async fn load_scene(name: &str) -> Result<SceneDescription, LoadError> {
    let text = resources::load_string(name).await?;
    let description = parse_scene(name, &text)?;
    validate(&description)?;
    Ok(description)
}

/// Everything a scene needs before its first frame: sound parent links and
/// an up vector the orbit axes can fall back on.
pub fn validate(description: &SceneDescription) -> Result<(), SceneError> {
    if Vector3::from(description.camera.approx_up).magnitude() <= MIN_AXIS_LENGTH {
        return Err(SceneError::ZeroUpVector);
    }
    validate_parents(&description.models)
}

/// Check that every parent link points at an earlier model and that no chain
/// loops. Runs once at load time, before the first frame.
pub fn validate_parents(models: &[ModelPlacement]) -> Result<(), SceneError> {
    let count = models.len();
    let mut visited = vec![false; count];

    for (index, model) in models.iter().enumerate() {
        // Walk the whole chain so cycles show up as a revisit
        visited.iter_mut().for_each(|v| *v = false);
        let mut current = index;
        visited[current] = true;
        while let Some(parent) = models[current].parent {
            if parent >= count {
                return Err(SceneError::ParentOutOfRange {
                    index: current,
                    parent,
                    count,
                });
            }
            if visited[parent] {
                return Err(SceneError::ParentCycle { index });
            }
            visited[parent] = true;
            current = parent;
        }

        if let Some(parent) = model.parent {
            if parent >= index {
                return Err(SceneError::ForwardParent { index, parent });
            }
        }
    }

    Ok(())
}

/// Fixed orbit axis for a child: the parent-to-child offset crossed with the
/// camera's up vector, computed once when the scene loads.
pub fn orbit_axis(
    parent: Point3<f32>,
    child: Point3<f32>,
    approx_up: Vector3<f32>,
) -> Vector3<f32> {
    let axis = (parent - child).cross(approx_up);
    if axis.magnitude() > MIN_AXIS_LENGTH {
        axis.normalize()
    } else {
        // Child sits on the parent's up line: orbit around up instead
        log::warn!("Degenerate orbit axis, falling back to the camera up vector");
        approx_up.normalize()
    }
}

/// Orbit parameters of a parented instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbit {
    pub parent: usize,
    /// Degrees per frame
    pub rate: f32,
    /// Unit rotation axis
    pub axis: Vector3<f32>,
}

/// Live placement of one model in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedInstance {
    /// `None` when the model failed to load; the instance still orbits
    /// (others may hang off it) but draws nothing
    pub model: Option<ModelId>,
    pub location: Point3<f32>,
    pub x_basis: Vector3<f32>,
    pub y_basis: Vector3<f32>,
    pub z_basis: Vector3<f32>,
    pub scale: Scale,
    pub orbit: Option<Orbit>,
}

impl PlacedInstance {
    /// `translate(location) * frame * scale`
    pub fn placement_matrix(&self) -> Matrix4<f32> {
        let mt = Matrix4::from_translation(self.location.to_vec());
        let mf = Matrix4::from_cols(
            self.x_basis.extend(0.0),
            self.y_basis.extend(0.0),
            self.z_basis.extend(0.0),
            Vector3::zero().extend(1.0),
        );
        mt * mf * self.scale.matrix()
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub instances: Vec<PlacedInstance>,
    pub lights: Vec<Light>,
    pub bg_color: [f32; 4],
}

impl Scene {
    /// Build the live scene. `resolve` maps a model URL (or built-in name) to
    /// a loaded model, returning `None` if that model couldn't be loaded.
    pub fn from_description(
        description: &SceneDescription,
        mut resolve: impl FnMut(&str) -> Option<ModelId>,
    ) -> Result<Self, SceneError> {
        validate(description)?;

        let approx_up = Vector3::from(description.camera.approx_up);
        let instances = description
            .models
            .iter()
            .map(|placement| {
                let location = Point3::from(placement.location);
                let orbit = placement.parent.map(|parent| {
                    let parent_location = Point3::from(description.models[parent].location);
                    Orbit {
                        parent,
                        rate: placement.speed.unwrap_or(0.0),
                        axis: orbit_axis(parent_location, location, approx_up),
                    }
                });
                PlacedInstance {
                    model: resolve(&placement.model_url),
                    location,
                    x_basis: Vector3::from(placement.x_basis),
                    y_basis: Vector3::from(placement.y_basis),
                    z_basis: Vector3::from(placement.z_basis),
                    scale: placement.scale,
                    orbit,
                }
            })
            .collect();

        if description.lights.len() > MAX_LIGHTS {
            log::warn!(
                "Scene defines {} lights, only the first {} are used",
                description.lights.len(),
                MAX_LIGHTS
            );
        }

        Ok(Self {
            instances,
            lights: description.lights.clone(),
            bg_color: description.bg_color.unwrap_or([0.0, 0.0, 0.0, 1.0]),
        })
    }

    /// Advance instance `index` along its parent chain by one frame.
    ///
    /// Each link of the chain rotates the instance's location by that link's
    /// rate about its axis, pivoting on the link's parent as it stands now.
    /// Links are applied root-most first: the ancestor links carry the
    /// instance along with its parent's move, then its own link turns it
    /// about where the parent is now. Parents come earlier in the list, so
    /// they have already moved this frame by the time their children are
    /// resolved.
    pub fn advance_orbit(&mut self, index: usize) {
        let mut chain = Vec::new();
        let mut node = index;
        while let Some(orbit) = self.instances[node].orbit {
            chain.push(orbit);
            node = orbit.parent;
        }

        let mut location = self.instances[index].location;
        for orbit in chain.iter().rev() {
            let pivot = self.instances[orbit.parent].location;
            let rotation = Matrix4::from_axis_angle(orbit.axis, Deg(orbit.rate));
            location = pivot + (rotation * (location - pivot).extend(0.0)).truncate();
        }
        self.instances[index].location = location;
    }

    /// Resolve and draw one frame.
    ///
    /// `stack` arrives holding the camera's view transform; every instance is
    /// drawn between a push and a pop so it comes back unchanged.
    #[allow(clippy::too_many_arguments)]
    pub fn redraw<'a>(
        &mut self,
        models: &'a ModelRegistry,
        stack: &mut TransformStack,
        projection: &Matrix4<f32>,
        lights: &[ViewLight],
        texture: TextureOptions,
        draws: &mut DrawList<'a>,
    ) {
        for index in 0..self.instances.len() {
            self.advance_orbit(index);

            let instance = &self.instances[index];
            let model = match instance.model.and_then(|id| models.get(id)) {
                Some(model) => model,
                None => continue,
            };
            let transform = instance.placement_matrix();

            stack.scoped(|stack| {
                stack.multiply(transform);
                model.redraw(stack, projection, lights, texture, draws);
            });
        }
    }

    /// Where a numeric key points the camera: `0` is the world origin, `n`
    /// is the current location of model `n - 1`. Anything else is ignored.
    pub fn look_at_target(&self, key: char) -> Option<Point3<f32>> {
        let n = key.to_digit(10)? as usize;
        if n == 0 {
            Some(Point3::origin())
        } else {
            self.instances.get(n - 1).map(|instance| instance.location)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::RecordingModel;
    use cgmath::{Vector4, Zero};

    fn placement(url: &str, location: [f32; 3], parent: Option<usize>, speed: f32) -> ModelPlacement {
        ModelPlacement {
            model_url: url.to_string(),
            scale: Scale::Uniform(1.0),
            location,
            x_basis: [1.0, 0.0, 0.0],
            y_basis: [0.0, 1.0, 0.0],
            z_basis: [0.0, 0.0, 1.0],
            parent,
            speed: Some(speed),
        }
    }

    fn description(models: Vec<ModelPlacement>) -> SceneDescription {
        SceneDescription {
            camera: CameraDescription {
                location: [0.0, 10.0, 20.0],
                look_at: [0.0, 0.0, 0.0],
                approx_up: [0.0, 0.0, 1.0],
                fov_deg: 60.0,
                near: 0.1,
                far: 100.0,
                perspective: true,
            },
            lights: Vec::new(),
            models,
            bg_color: None,
        }
    }

    fn assert_point_eq(actual: Point3<f32>, expected: [f32; 3]) {
        let expected = Point3::from(expected);
        assert!(
            (actual - expected).magnitude() < 1e-4,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    fn no_models(_: &str) -> Option<ModelId> {
        None
    }

    #[test]
    fn child_orbits_parent_by_rate_each_frame() {
        let desc = description(vec![
            placement("Sun", [0.0, 0.0, 0.0], None, 0.0),
            placement("Earth", [1.0, 0.0, 0.0], Some(0), 90.0),
        ]);
        let mut scene = Scene::from_description(&desc, no_models).unwrap();
        // (parent - child) x up = (-1,0,0) x (0,0,1) = (0,1,0)
        let orbit = scene.instances[1].orbit.unwrap();
        assert!((orbit.axis - Vector3::unit_y()).magnitude() < 1e-6);

        scene.advance_orbit(1);
        assert_point_eq(scene.instances[1].location, [0.0, 0.0, -1.0]);
        scene.advance_orbit(1);
        assert_point_eq(scene.instances[1].location, [-1.0, 0.0, 0.0]);
    }

    #[test]
    fn roots_are_untouched_by_orbits() {
        let desc = description(vec![
            placement("Sun", [2.0, 3.0, 4.0], None, 45.0),
            placement("Earth", [5.0, 3.0, 4.0], Some(0), 30.0),
            placement("Other", [-1.0, -1.0, -1.0], None, 10.0),
        ]);
        let mut scene = Scene::from_description(&desc, no_models).unwrap();
        let models = ModelRegistry::new();
        let mut stack = TransformStack::new();
        let mut draws = DrawList::new();
        for _ in 0..5 {
            scene.redraw(&models, &mut stack, &Matrix4::identity(), &[], TextureOptions::default(), &mut draws);
        }
        assert_point_eq(scene.instances[0].location, [2.0, 3.0, 4.0]);
        assert_point_eq(scene.instances[2].location, [-1.0, -1.0, -1.0]);
        // The child kept its distance from the root it circles
        let offset = scene.instances[1].location - scene.instances[0].location;
        assert!((offset.magnitude() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn grandchild_is_carried_along_by_parent_orbit() {
        let mut sun = placement("Sun", [0.0, 0.0, 0.0], None, 0.0);
        sun.speed = None;
        let desc = description(vec![
            sun,
            placement("Earth", [10.0, 0.0, 0.0], Some(0), 90.0),
            placement("Moon", [11.0, 0.0, 0.0], Some(1), 0.0),
        ]);
        let mut scene = Scene::from_description(&desc, no_models).unwrap();
        let models = ModelRegistry::new();
        let mut stack = TransformStack::new();
        let mut draws = DrawList::new();
        scene.redraw(&models, &mut stack, &Matrix4::identity(), &[], TextureOptions::default(), &mut draws);

        assert_point_eq(scene.instances[1].location, [0.0, 0.0, -10.0]);
        assert_point_eq(scene.instances[2].location, [0.0, 0.0, -11.0]);
    }

    #[test]
    fn orbiting_grandchild_keeps_its_distance_from_moving_parent() {
        let desc = description(vec![
            placement("Sun", [0.0, 0.0, 0.0], None, 0.0),
            placement("Earth", [10.0, 0.0, 0.0], Some(0), 90.0),
            placement("Moon", [11.0, 0.0, 0.0], Some(1), 90.0),
        ]);
        let mut scene = Scene::from_description(&desc, no_models).unwrap();
        let models = ModelRegistry::new();
        let mut stack = TransformStack::new();
        let mut draws = DrawList::new();

        scene.redraw(&models, &mut stack, &Matrix4::identity(), &[], TextureOptions::default(), &mut draws);
        assert_point_eq(scene.instances[1].location, [0.0, 0.0, -10.0]);
        // Carried to (0,0,-11) with the earth, then a quarter turn about it
        assert_point_eq(scene.instances[2].location, [-1.0, 0.0, -10.0]);

        for _ in 0..7 {
            scene.redraw(&models, &mut stack, &Matrix4::identity(), &[], TextureOptions::default(), &mut draws);
            let offset = scene.instances[2].location - scene.instances[1].location;
            assert!((offset.magnitude() - 1.0).abs() < 1e-4, "moon drifted to {:?}", offset);
        }
    }

    #[test]
    fn bundled_moon_holds_its_orbit_radius() {
        let desc = parse_scene("scene.json", include_str!("../assets/scene.json")).unwrap();
        let moon = desc.models.iter().position(|m| m.model_url == "Moon").unwrap();
        let earth = desc.models[moon].parent.unwrap();
        let radius = (Point3::from(desc.models[moon].location)
            - Point3::from(desc.models[earth].location))
        .magnitude();

        let mut scene = Scene::from_description(&desc, no_models).unwrap();
        let models = ModelRegistry::new();
        let mut stack = TransformStack::new();
        let mut draws = DrawList::new();
        for _ in 0..450 {
            scene.redraw(&models, &mut stack, &Matrix4::identity(), &[], TextureOptions::default(), &mut draws);
        }
        let offset = scene.instances[moon].location - scene.instances[earth].location;
        assert!((offset.magnitude() - radius).abs() < 1e-2);
    }

    #[test]
    fn zero_up_vector_is_rejected() {
        let mut desc = description(vec![placement("Sun", [0.0; 3], None, 0.0)]);
        desc.camera.approx_up = [0.0, 0.0, 0.0];
        assert_eq!(
            Scene::from_description(&desc, no_models).unwrap_err(),
            SceneError::ZeroUpVector
        );
    }

    #[test]
    fn placement_composes_translate_frame_scale() {
        let instance = PlacedInstance {
            model: None,
            location: Point3::new(1.0, 2.0, 3.0),
            x_basis: Vector3::new(0.0, 1.0, 0.0),
            y_basis: Vector3::new(-1.0, 0.0, 0.0),
            z_basis: Vector3::new(0.0, 0.0, 1.0),
            scale: Scale::PerAxis([2.0, 1.0, 1.0]),
            orbit: None,
        };
        let p = instance.placement_matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        // scaled to x=2, x basis maps it onto +y, then moved by location
        assert!((p - Vector4::new(1.0, 4.0, 3.0, 1.0)).magnitude() < 1e-6);
    }

    #[test]
    fn redraw_hands_models_view_times_placement_and_restores_stack() {
        let desc = description(vec![
            placement("a", [1.0, 0.0, 0.0], None, 0.0),
            placement("missing", [0.0, 5.0, 0.0], None, 0.0),
            placement("a", [0.0, 0.0, 2.0], None, 0.0),
        ]);
        let mut registry = ModelRegistry::new();
        let recorder = RecordingModel::new("a");
        let seen = recorder.log();
        let id = registry.insert("a", Box::new(recorder));
        let mut scene =
            Scene::from_description(&desc, |url| if url == "a" { Some(id) } else { None }).unwrap();

        let view = Matrix4::from_translation(Vector3::new(0.0, 0.0, -10.0));
        let mut stack = TransformStack::new();
        stack.multiply(view);
        let mut draws = DrawList::new();
        scene.redraw(&registry, &mut stack, &Matrix4::identity(), &[], TextureOptions::default(), &mut draws);

        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.top(), view);

        // Only the two instances with a model were drawn, sharing one model
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        let origin = Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(seen[0] * origin, Vector4::new(1.0, 0.0, -10.0, 1.0));
        assert_eq!(seen[1] * origin, Vector4::new(0.0, 0.0, -8.0, 1.0));
    }

    #[test]
    fn forward_parent_is_rejected() {
        let desc = description(vec![
            placement("a", [0.0; 3], Some(1), 1.0),
            placement("b", [1.0, 0.0, 0.0], None, 0.0),
        ]);
        assert_eq!(
            Scene::from_description(&desc, no_models).unwrap_err(),
            SceneError::ForwardParent { index: 0, parent: 1 }
        );
    }

    #[test]
    fn out_of_range_parent_is_rejected() {
        let desc = description(vec![
            placement("a", [0.0; 3], None, 0.0),
            placement("b", [1.0, 0.0, 0.0], Some(7), 1.0),
        ]);
        assert_eq!(
            validate_parents(&desc.models),
            Err(SceneError::ParentOutOfRange {
                index: 1,
                parent: 7,
                count: 2
            })
        );
    }

    #[test]
    fn cycles_are_rejected() {
        let self_loop = vec![placement("a", [0.0; 3], Some(0), 1.0)];
        assert_eq!(
            validate_parents(&self_loop),
            Err(SceneError::ParentCycle { index: 0 })
        );

        let pair = vec![
            placement("a", [0.0; 3], Some(1), 1.0),
            placement("b", [1.0, 0.0, 0.0], Some(0), 1.0),
        ];
        assert_eq!(validate_parents(&pair), Err(SceneError::ParentCycle { index: 0 }));
    }

    #[test]
    fn degenerate_axis_falls_back_to_up() {
        let axis = orbit_axis(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 3.0),
            Vector3::new(0.0, 0.0, 2.0),
        );
        assert!((axis - Vector3::unit_z()).magnitude() < 1e-6);
        assert!(!axis.is_zero());
    }

    #[test]
    fn numeric_keys_pick_look_at_targets() {
        let desc = description(vec![
            placement("a", [1.0, 2.0, 3.0], None, 0.0),
            placement("b", [4.0, 5.0, 6.0], None, 0.0),
        ]);
        let scene = Scene::from_description(&desc, no_models).unwrap();
        assert_eq!(scene.look_at_target('0'), Some(Point3::origin()));
        assert_eq!(scene.look_at_target('2'), Some(Point3::new(4.0, 5.0, 6.0)));
        assert_eq!(scene.look_at_target('3'), None);
        assert_eq!(scene.look_at_target('x'), None);
    }

    #[test]
    fn parses_scene_file_fields() {
        let json = r#"{
            "camera": {
                "location": [0, 0, 20], "lookAt": [0, 0, 0], "approxUp": [0, 1, 0],
                "FOVdeg": 60, "near": 0.5, "far": 200, "perspective": false
            },
            "lights": [
                { "location": [0, 10, 0], "diffuse": [1, 1, 1],
                  "ambient": [0.1, 0.1, 0.1], "specular": [1, 1, 1] }
            ],
            "models": [
                { "modelURL": "Sun", "scale": 2, "location": [0, 0, 0],
                  "xBasis": [1, 0, 0], "yBasis": [0, 1, 0], "zBasis": [0, 0, 1] },
                { "modelURL": "Earth", "scale": [0.5, 0.5, 0.5], "location": [5, 0, 0],
                  "xBasis": [1, 0, 0], "yBasis": [0, 1, 0], "zBasis": [0, 0, 1],
                  "parent": 0, "speed": 1.5 }
            ],
            "bgColor": [0.1, 0.1, 0.2, 1]
        }"#;
        let desc = parse_scene("scene.json", json).unwrap();
        assert!(!desc.camera.perspective);
        assert_eq!(desc.lights.len(), 1);
        assert_eq!(desc.models[0].scale, Scale::Uniform(2.0));
        assert_eq!(desc.models[1].scale, Scale::PerAxis([0.5, 0.5, 0.5]));
        assert_eq!(desc.models[1].parent, Some(0));
        assert_eq!(desc.models[1].speed, Some(1.5));
        assert_eq!(desc.bg_color, Some([0.1, 0.1, 0.2, 1.0]));

        let scene = Scene::from_description(&desc, no_models).unwrap();
        assert_eq!(scene.bg_color, [0.1, 0.1, 0.2, 1.0]);
        assert!(scene.instances[0].orbit.is_none());
        assert_eq!(scene.instances[1].orbit.map(|o| o.rate), Some(1.5));
    }

    #[test]
    fn bundled_scene_is_valid() {
        let text = include_str!("../assets/scene.json");
        let desc = parse_scene("scene.json", text).unwrap();
        let scene = Scene::from_description(&desc, no_models).unwrap();
        assert_eq!(scene.instances.len(), desc.models.len());
        assert!(scene.instances.iter().skip(1).all(|i| i.orbit.is_some()));
    }

    #[test]
    fn loading_a_cyclic_scene_fails_before_any_frame() {
        let mut desc = serde_json::from_str::<serde_json::Value>(include_str!("../assets/scene.json")).unwrap();
        desc["models"][0]["parent"] = serde_json::json!(1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyclic.json");
        std::fs::write(&path, desc.to_string()).unwrap();

        let result = pollster::block_on(load_scene(path.to_str().unwrap()));
        assert!(matches!(
            result,
            Err(LoadError::Scene(SceneError::ParentCycle { index: 0 }))
        ));
    }
}
