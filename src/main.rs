use std::path::PathBuf;

fn main() {
    let texture = std::env::args_os().nth(1).map(PathBuf::from);
    if let Err(err) = wgpu_shadowmap::run(texture) {
        eprintln!("Application error: {err}");
    }
}
