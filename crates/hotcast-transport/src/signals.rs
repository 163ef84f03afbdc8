use hotcast_core::SignalFlags;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM, SIGUSR1};
use signal_hook::SigId;

/// Routes process signals onto the loop's request flags.
///
/// SIGINT/SIGTERM request shutdown, SIGHUP/SIGUSR1 request a full reload.
/// The handlers only store into an atomic; all work happens on the loop
/// thread at its next iteration.
pub fn install(flags: &SignalFlags) -> std::io::Result<Vec<SigId>> {
    let mut ids = Vec::with_capacity(4);
    for signal in [SIGINT, SIGTERM] {
        ids.push(signal_hook::flag::register(signal, flags.shutdown_flag())?);
    }
    for signal in [SIGHUP, SIGUSR1] {
        ids.push(signal_hook::flag::register(signal, flags.reload_flag())?);
    }
    tracing::debug!("Installed shutdown (INT, TERM) and reload (HUP, USR1) signal handlers");
    Ok(ids)
}

/// Removes handlers installed by [`install`].
pub fn uninstall(ids: Vec<SigId>) {
    for id in ids {
        signal_hook::low_level::unregister(id);
    }
}
