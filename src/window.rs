use anyhow::Context as _;
use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window,
};

use crate::config::AppConfig;

pub enum WindowEvents {
    Resized {
        width: u32,
        height: u32,
        scale_factor: f32,
    },
    /// Pointer position in physical pixels
    PointerMoved {
        x: f32,
        y: f32,
    },
    PointerButton {
        pressed: bool,
    },
    Character(char),
    Draw,
}

pub struct Window {
    event_loop: EventLoop<()>,
    pub window: window::Window,
}

impl Window {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new();
        let window = window::WindowBuilder::new()
            .with_title(&config.title)
            .with_inner_size(LogicalSize::new(config.width, config.height))
            .build(&event_loop)
            .context("Couldn't create the window")?;

        #[cfg(target_arch = "wasm32")]
        {
            // Winit prevents sizing with CSS, so we have to set
            // the size manually when on web.
            use winit::dpi::PhysicalSize;
            window.set_inner_size(PhysicalSize::new(config.width, config.height));

            use winit::platform::web::WindowExtWebSys;
            web_sys::window()
                .and_then(|win| win.document())
                .and_then(|doc| {
                    let dst = doc.body()?;
                    let canvas = web_sys::Element::from(window.canvas());
                    dst.append_child(&canvas).ok()?;
                    Some(())
                })
                .context("Couldn't append canvas to document body")?;
        }

        Ok(Self { event_loop, window })
    }

    pub fn scale_factor(&self) -> f32 {
        self.window.scale_factor() as f32
    }

    /// Hand window events to `callback` until the window closes, Escape is
    /// pressed, or the callback returns an error.
    pub fn run(
        self,
        mut callback: impl 'static + FnMut(WindowEvents) -> anyhow::Result<()>,
    ) -> ! {
        let Self { event_loop, window } = self;
        event_loop.run(move |event, _, control_flow| {
            let result = match event {
                Event::WindowEvent {
                    ref event,
                    window_id,
                } if window_id == window.id() => match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(VirtualKeyCode::Escape),
                                ..
                            },
                        ..
                    } => {
                        *control_flow = ControlFlow::Exit;
                        Ok(())
                    }
                    WindowEvent::Resized(physical_size) => callback(WindowEvents::Resized {
                        width: physical_size.width,
                        height: physical_size.height,
                        scale_factor: window.scale_factor() as f32,
                    }),
                    WindowEvent::ScaleFactorChanged {
                        new_inner_size,
                        scale_factor,
                    } => {
                        // new_inner_size is &&mut so we have to dereference it twice
                        callback(WindowEvents::Resized {
                            width: new_inner_size.width,
                            height: new_inner_size.height,
                            scale_factor: *scale_factor as f32,
                        })
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        callback(WindowEvents::PointerMoved {
                            x: position.x as f32,
                            y: position.y as f32,
                        })
                    }
                    WindowEvent::MouseInput {
                        state,
                        button: MouseButton::Left,
                        ..
                    } => callback(WindowEvents::PointerButton {
                        pressed: *state == ElementState::Pressed,
                    }),
                    WindowEvent::ReceivedCharacter(c) => callback(WindowEvents::Character(*c)),
                    _ => Ok(()),
                },
                Event::RedrawRequested(window_id) if window_id == window.id() => {
                    callback(WindowEvents::Draw)
                }
                Event::RedrawEventsCleared => {
                    // RedrawRequested will only trigger once, unless we manually
                    // request it.
                    window.request_redraw();
                    Ok(())
                }
                _ => Ok(()),
            };

            if let Err(err) = result {
                log::error!("{:#}", err);
                *control_flow = ControlFlow::Exit;
            }
        })
    }
}
