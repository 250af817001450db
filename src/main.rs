//! Voiceform - a voice-reactive deformable surface
//!
//! Your voice drives the shape: band energies from the microphone pull the
//! surface between its idle and active forms, noise fields ripple the skin,
//! and the pointer pushes a dent that glides across the surface.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use glam::Vec3;
use tracing::{debug, info, warn};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use voiceform::analyzer::AudioAnalyzer;
use voiceform::animator::SurfaceAnimator;
use voiceform::cli::Args;
use voiceform::field::{evaluate_surface, NoiseField, SurfaceVertex};
use voiceform::geometry::{Ray, SphereMesh};
use voiceform::params::{
    self, AnalysisConfig, AnimatorTuning, FieldTuning, InteractionTuning, RenderConfig,
    SharedParams, ANIMATION_SPEED_RANGE, NOISE_GATE_RANGE, SENSITIVITY_RANGE,
};
use voiceform::rendering::{BackgroundUniforms, RenderSystem, Uniforms};
use voiceform::telemetry::TelemetryChannel;

/// Main application state
struct App {
    // Window and rendering
    window: Option<Arc<Window>>,
    render_system: Option<RenderSystem>,

    // Core pipeline
    params: SharedParams,
    analyzer: AudioAnalyzer,
    animator: SurfaceAnimator,
    noise: NoiseField,
    mesh: SphereMesh,
    telemetry: TelemetryChannel,

    // Configuration
    render_config: RenderConfig,
    requested_device: Option<String>,

    // Per-frame state
    vertex_scratch: Vec<SurfaceVertex>,
    cursor: Option<(f32, f32)>,
    start_time: Instant,
    last_frame: Instant,
    last_level_log: Instant,
}

impl App {
    fn new(args: &Args) -> Self {
        let params = params::shared(args.tuning_params());
        let analyzer = AudioAnalyzer::new(AnalysisConfig::default(), Arc::clone(&params))
            .expect("default analysis config is valid");

        let render_config = RenderConfig {
            mesh_segments: args.resolution.max(8),
            mesh_rings: (args.resolution / 2).max(4),
            ..RenderConfig::default()
        };
        let mesh = SphereMesh::new(
            render_config.mesh_segments,
            render_config.mesh_rings,
            render_config.sphere_radius,
        );

        let field_tuning = FieldTuning::default();
        let telemetry = TelemetryChannel::new();
        let animator = SurfaceAnimator::new(
            AnimatorTuning::default(),
            InteractionTuning::default(),
            &field_tuning,
            render_config.sphere_radius,
            telemetry.clone(),
        );
        let noise = NoiseField::new(field_tuning.noise_seed);

        let now = Instant::now();
        Self {
            window: None,
            render_system: None,
            params,
            analyzer,
            animator,
            noise,
            mesh,
            telemetry,
            render_config,
            requested_device: args.device.clone(),
            vertex_scratch: Vec::new(),
            cursor: None,
            start_time: now,
            last_frame: now,
            last_level_log: now,
        }
    }

    fn handle_key(&mut self, code: KeyCode, event_loop: &winit::event_loop::ActiveEventLoop) {
        match code {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::ArrowUp | KeyCode::ArrowDown => {
                let mut params = self.params.lock().unwrap();
                let step = if code == KeyCode::ArrowUp { 0.1 } else { -0.1 };
                params.sensitivity = (params.sensitivity + step)
                    .clamp(SENSITIVITY_RANGE.0, SENSITIVITY_RANGE.1);
                info!(sensitivity = params.sensitivity, "sensitivity");
            }
            KeyCode::ArrowRight | KeyCode::ArrowLeft => {
                let mut params = self.params.lock().unwrap();
                let step = if code == KeyCode::ArrowRight { 0.01 } else { -0.01 };
                params.noise_gate =
                    (params.noise_gate + step).clamp(NOISE_GATE_RANGE.0, NOISE_GATE_RANGE.1);
                info!(noise_gate = params.noise_gate, "noise gate");
            }
            KeyCode::Equal | KeyCode::Minus => {
                let mut params = self.params.lock().unwrap();
                let step = if code == KeyCode::Equal { 0.1 } else { -0.1 };
                params.animation_speed = (params.animation_speed + step)
                    .clamp(ANIMATION_SPEED_RANGE.0, ANIMATION_SPEED_RANGE.1);
                info!(animation_speed = params.animation_speed, "animation speed");
            }
            KeyCode::KeyM => {
                let mut params = self.params.lock().unwrap();
                params.muted = !params.muted;
                info!(muted = params.muted, "mute");
            }
            KeyCode::Tab => self.cycle_device(),
            _ => {}
        }
    }

    /// Switch to the next input device (stop, then start on the new one)
    fn cycle_device(&mut self) {
        let devices = match AudioAnalyzer::devices() {
            Ok(devices) if !devices.is_empty() => devices,
            Ok(_) => {
                warn!("no input devices to switch to");
                return;
            }
            Err(e) => {
                warn!("device enumeration failed: {e}");
                return;
            }
        };

        let next_index = self
            .analyzer
            .current_device()
            .and_then(|id| devices.iter().position(|d| d.device_id == id))
            .map(|i| (i + 1) % devices.len())
            .unwrap_or(0);
        let next = &devices[next_index];

        match self.analyzer.switch_device(&next.device_id) {
            Ok(()) => info!(device = %next.label, "switched input device"),
            Err(e) => warn!("device switch failed: {e}"),
        }
    }

    /// Render a single frame
    fn render_frame(&mut self) {
        let Some(render_system) = self.render_system.as_mut() else {
            return;
        };

        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        // Analysis tick and animation update share the render clock
        self.analyzer.tick();
        let voice = self.analyzer.voice();
        let snap = params::snapshot_of(&self.params);

        let viewport = render_system.viewport();
        let view_proj = self.render_config.view_proj(viewport.0 / viewport.1);
        let pointer = self
            .cursor
            .and_then(|cursor| Ray::from_screen(cursor, viewport, view_proj.inverse()));

        self.animator.update(dt, &voice, &snap, pointer.as_ref());

        // Evaluate the field over the base mesh and hand it to the GPU
        let model = self.animator.model_matrix();
        let eye_local = model
            .inverse()
            .transform_point3(Vec3::from_array(self.render_config.eye));
        evaluate_surface(
            &self.mesh,
            &self.noise,
            self.animator.field(),
            eye_local,
            self.animator.opacity(),
            &mut self.vertex_scratch,
        );

        render_system.update_vertices(&self.vertex_scratch);
        render_system.update_uniforms(&Uniforms {
            mvp: (view_proj * model).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
        });
        render_system.update_background(&BackgroundUniforms {
            time: self.start_time.elapsed().as_secs_f32(),
            _padding: [0.0; 3],
        });

        match render_system.render(self.animator.is_opaque()) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                render_system.resize(viewport.0 as u32, viewport.1 as u32);
            }
            Err(e) => warn!("render error: {e:?}"),
        }

        if self.last_level_log.elapsed().as_secs_f32() >= 1.0 {
            self.last_level_log = now;
            let levels = self.telemetry.latest();
            debug!(
                low = levels.low,
                mid = levels.mid,
                high = levels.high,
                "band levels"
            );
        }
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &winit::event_loop::ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        let window_attributes = Window::default_attributes()
            .with_title("Voiceform - Voice-Reactive Surface")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.render_config.window_width,
                self.render_config.window_height,
            ));
        let window = Arc::new(event_loop.create_window(window_attributes).unwrap());

        let render_system =
            pollster::block_on(RenderSystem::new(Arc::clone(&window), &self.mesh)).unwrap();

        // A missing microphone degrades to an idle visual, never a crash
        if let Err(e) = self.analyzer.start(self.requested_device.as_deref()) {
            warn!("microphone unavailable, running idle: {e}");
        }

        info!("voiceform is running, press Esc to quit");
        self.window = Some(window);
        self.render_system = Some(render_system);
        self.last_frame = Instant::now();
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(render_system) = self.render_system.as_mut() {
                    render_system.resize(size.width, size.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some((position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        ..
                    },
                ..
            } => self.handle_key(code, event_loop),
            WindowEvent::RedrawRequested => {
                self.render_frame();
            }
            _ => {}
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        match AudioAnalyzer::devices() {
            Ok(devices) if devices.is_empty() => println!("No input devices found"),
            Ok(devices) => {
                for device in devices {
                    println!("{}", device.label);
                }
            }
            Err(e) => eprintln!("Failed to enumerate devices: {e}"),
        }
        return;
    }

    let mut app = App::new(&args);
    let event_loop = EventLoop::new().unwrap();
    let _ = event_loop.run_app(&mut app);
}
