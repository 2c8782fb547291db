//! Shell command execution.

use std::process::Command;

use crate::error::Result;
use crate::interp::{Call, Interp};
use crate::value::Value;

/// Run `command` through `sh -c` and wait for it.
///
/// Returns the exit code, or -1 when the shell could not be spawned or the
/// process was terminated by a signal.
pub fn run_shell(command: &str) -> i32 {
    match Command::new("sh").arg("-c").arg(command).status() {
        Ok(status) => status.code().unwrap_or_else(|| {
            log::warn!("`{command}` terminated by a signal");
            -1
        }),
        Err(e) => {
            log::warn!("cannot run `{command}`: {e}");
            -1
        }
    }
}

pub(crate) fn register(interp: &mut Interp) {
    interp.register("yocoSystem", 1, yoco_system);
}

fn yoco_system(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let command = call.string(interp, 0)?;
    log::debug!("yocoSystem: {command}");
    Ok(Value::Int(i64::from(run_shell(&command))))
}
