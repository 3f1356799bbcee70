pub mod app;
pub mod camera;
pub mod cone_tracing;
pub mod config;
pub mod dominant_axis;
pub mod error;
pub mod graphics;
pub mod reference;
pub mod scene;
pub mod visualization;
pub mod volume;
pub mod voxelization;

#[cfg(target_arch="wasm32")]
use wasm_bindgen::prelude::*;

use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::PhysicalKey,
    window::WindowBuilder,
};

use crate::app::{command_for_key, App};
use crate::config::DemoConfig;
use crate::error::InitError;
use crate::graphics::{FramePipeline, Graphics};
use crate::scene::Scene;

/// Requests a device with the limits the voxel pipelines need, enabling
/// conservative rasterization when the adapter offers it.
pub async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), InitError> {
    let mut required_features = wgpu::Features::empty();
    if adapter.features().contains(wgpu::Features::CONSERVATIVE_RASTERIZATION) {
        required_features.insert(wgpu::Features::CONSERVATIVE_RASTERIZATION);
    }
    let required_limits = wgpu::Limits::default().using_resolution(adapter.limits());

    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Voxel Cone Tracing Device"),
                required_features,
                required_limits,
                memory_hints: wgpu::MemoryHints::MemoryUsage,
            },
            None,
        )
        .await
        .map_err(|err| InitError::DeviceCreation(err.to_string()))
}

async fn arun(config: DemoConfig) -> Result<(), InitError> {
    config.validate()?;

    let event_loop = EventLoop::new().map_err(|err| InitError::Window(err.to_string()))?;
    let window = WindowBuilder::new()
        .with_title("Voxel Cone Tracing")
        .with_inner_size(PhysicalSize::new(config.viewport_width, config.viewport_height))
        .build(&event_loop)
        .map_err(|err| InitError::Window(err.to_string()))?;

    #[cfg(target_arch = "wasm32")]
    {
        // Winit prevents sizing with CSS, so we have to set
        // the size manually when on web.
        let _ = window.request_inner_size(PhysicalSize::new(config.viewport_width, config.viewport_height));

        use winit::platform::web::WindowExtWebSys;
        web_sys::window()
            .and_then(|win| win.document())
            .and_then(|doc| {
                let dst = doc.get_element_by_id("voxel-cone-tracing")?;
                let canvas = web_sys::Element::from(window.canvas()?);
                dst.append_child(&canvas).ok()?;
                Some(())
            })
            .ok_or_else(|| InitError::Window("couldn't append canvas to document body".to_string()))?;
    }

    let size = window.inner_size();
    let instance = wgpu::Instance::default();
    let surface = instance
        .create_surface(&window)
        .map_err(|err| InitError::SurfaceCreation(err.to_string()))?;
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            // Request an adapter which can render to our surface
            compatible_surface: Some(&surface),
        })
        .await
        .ok_or(InitError::NoAdapter)?;
    log::info!("Using adapter {:?}", adapter.get_info().name);

    let (device, queue) = request_device(&adapter).await?;

    let mut surface_config = surface
        .get_default_config(&adapter, size.width.max(1), size.height.max(1))
        .ok_or(InitError::SurfaceUnsupported)?;
    surface.configure(&device, &surface_config);

    let config = DemoConfig {
        viewport_width: surface_config.width,
        viewport_height: surface_config.height,
        ..config
    };
    let graphics = Graphics::init(&device, &queue, surface_config.format, &config)?;
    let aspect = surface_config.width as f32 / surface_config.height as f32;
    let scene = Scene::new(&device, graphics.mesh_layouts(), config.scene, aspect);
    let mut app = App::new(graphics, scene, config.rendering_mode);

    let window = &window;
    event_loop
        .run(move |event, target| {
            // Have the closure take ownership of the resources.
            let _ = (&instance, &adapter);

            if let Event::AboutToWait = event {
                window.request_redraw();
            }

            if let Event::WindowEvent {
                window_id: _,
                event,
            } = event
            {
                match event {
                    WindowEvent::Resized(new_size) => {
                        surface_config.width = new_size.width.max(1);
                        surface_config.height = new_size.height.max(1);
                        surface.configure(&device, &surface_config);
                        app.resize(&device, surface_config.width, surface_config.height);
                        // On macos the window needs to be redrawn manually after resizing
                        window.request_redraw();
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(key),
                                state: ElementState::Pressed,
                                repeat: false,
                                ..
                            },
                        ..
                    } => {
                        if let Some(command) = command_for_key(key) {
                            if !app.apply(command) {
                                target.exit();
                            }
                        }
                    }
                    WindowEvent::RedrawRequested => match surface.get_current_texture() {
                        Ok(frame) => {
                            let view = frame
                                .texture
                                .create_view(&wgpu::TextureViewDescriptor::default());
                            app.frame(&device, &queue, &view);
                            frame.present();
                        }
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            surface.configure(&device, &surface_config);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("Surface out of memory, exiting");
                            target.exit();
                        }
                        Err(err) => log::warn!("Skipping frame: {err}"),
                    },
                    WindowEvent::CloseRequested => target.exit(),
                    _ => {}
                };
            }
        })
        .map_err(|err| InitError::Window(err.to_string()))
}

fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            if let Err(err) = console_log::init_with_level(log::Level::Info) {
                web_sys::console::error_1(&format!("Couldn't initialize logger: {err}").into());
            }
        } else {
            env_logger::init();
        }
    }
}

/// Runs the demo with `config` until the window closes.
pub fn run_with_config(config: DemoConfig) {
    init_logging();

    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(err) = pollster::block_on(arun(config)) {
            log::error!("{err}");
            std::process::exit(1);
        }
    }
    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = arun(config).await {
                log::error!("{err}");
            }
        });
    }
}

#[cfg_attr(target_arch="wasm32", wasm_bindgen(start))]
pub fn run() {
    run_with_config(DemoConfig::default());
}
