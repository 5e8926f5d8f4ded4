//! Entry point for the mesh viewer.
//! Logging + `--flag=value` CLI parsing into a `ViewerConfig`.

use std::path::PathBuf;

use anyhow::Result;
use corelib::ShadingMode;
use platform::ViewerConfig;

fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{other}', falling back to auto.");
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_show_fps_arg(args: &[String]) -> bool {
    // --show-fps[=on|off], default off
    for arg in args {
        if arg == "--show-fps" {
            return true;
        }
        if let Some(val) = arg.strip_prefix("--show-fps=") {
            return matches!(
                val.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        }
    }
    false
}

fn parse_size_args(args: &[String]) -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in args {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    let ww = w.unwrap_or(1280).max(1);
    let hh = h.unwrap_or(720).max(1);
    (ww, hh)
}

/// Last `--<name>=<path>` wins.
fn parse_path_arg(args: &[String], name: &str) -> Option<PathBuf> {
    let prefix = format!("--{name}=");
    args.iter()
        .filter_map(|arg| arg.strip_prefix(prefix.as_str()))
        .filter(|v| !v.is_empty())
        .last()
        .map(PathBuf::from)
}

/// --mode=reflect|refract|phong|none. Unknown names keep the default.
fn parse_mode_arg(args: &[String]) -> Option<ShadingMode> {
    let mut mode = Some(ShadingMode::default());
    for arg in args {
        if let Some(val) = arg.strip_prefix("--mode=") {
            if val.eq_ignore_ascii_case("none") {
                mode = None;
                continue;
            }
            match val.parse::<ShadingMode>() {
                Ok(m) => mode = Some(m),
                Err(e) => log::warn!("{e}; keeping {:?}", mode),
            }
        }
    }
    mode
}

fn parse_config(args: &[String]) -> ViewerConfig {
    let defaults = ViewerConfig::default();
    let (width, height) = parse_size_args(args);
    ViewerConfig {
        backends: parse_backend_arg(args),
        show_fps: parse_show_fps_arg(args),
        width,
        height,
        mesh_path: parse_path_arg(args, "mesh").unwrap_or(defaults.mesh_path),
        skybox_dir: parse_path_arg(args, "skybox"),
        mode: parse_mode_arg(args),
        mesh_half_size: defaults.mesh_half_size,
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = parse_config(&args);
    log::info!(
        "Starting mesh viewer. Backend: {:?}, show_fps={}, window_size={}x{}, mesh={}, mode={:?}",
        config.backends,
        config.show_fps,
        config.width,
        config.height,
        config.mesh_path.display(),
        config.mode
    );

    platform::run_viewer(config)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
