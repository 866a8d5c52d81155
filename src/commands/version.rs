use anyhow::Result;

use crate::platform::is_elevated;

pub fn execute() -> Result<()> {
    println!("corewarden version {}", env!("CARGO_PKG_VERSION"));
    if is_elevated() {
        println!("running with elevated privileges");
    }
    Ok(())
}
