/// Moves the calling thread into the SCHED_FIFO class at `priority`.
///
/// On platforms without POSIX realtime scheduling this is a no-op.
#[cfg(target_os = "linux")]
pub fn promote_current_thread(priority: i32) -> std::io::Result<()> {
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    let param = libc::sched_param {
        sched_priority: priority.clamp(min, max),
    };
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(std::io::Error::from_raw_os_error(rc));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn promote_current_thread(_priority: i32) -> std::io::Result<()> {
    Ok(())
}
