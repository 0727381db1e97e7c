use core::ffi::{c_int, c_uint, c_void, CStr};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rtaudio_c::*;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Apis => list_apis(),
        Commands::Devices(args) => list_devices(args),
        Commands::Play(args) => play(args),
    }
}

#[derive(Parser)]
#[command(author, version, about = "Inspect and exercise rtaudio backends")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the audio APIs compiled into this build.
    Apis,
    /// List the devices an API reports.
    Devices(DevicesArgs),
    /// Play a sawtooth on an output device.
    Play(PlayArgs),
}

#[derive(Args)]
struct DevicesArgs {
    /// API short name (`alsa`, `jack`, `dummy`, ...). Auto-selects when omitted.
    #[arg(long)]
    api: Option<String>,
    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PlayArgs {
    #[arg(long)]
    api: Option<String>,
    /// Output device; defaults to the API's default output.
    #[arg(long)]
    device: Option<u32>,
    #[arg(long, default_value_t = 2)]
    channels: u32,
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,
    #[arg(long, default_value_t = 256)]
    buffer_frames: u32,
    /// Playback length in seconds.
    #[arg(long, default_value_t = 2.0)]
    seconds: f64,
}

/// Owns one handle from `rtaudio_create`.
struct Audio(rtaudio_t);

impl Audio {
    fn open(api: Option<&str>) -> Result<Self> {
        let api = match api {
            None => RTAUDIO_API_UNSPECIFIED,
            Some(name) => resolve_api(name)?,
        };
        let audio = Audio(rtaudio_create(api));
        if audio.0.is_null() {
            bail!("rtaudio_create returned a null handle");
        }
        audio.check("creating the audio instance")?;
        Ok(audio)
    }

    fn last_error(&self) -> Option<String> {
        let ptr = unsafe { rtaudio_error(self.0) };
        (!ptr.is_null()).then(|| unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }

    fn check(&self, what: &str) -> Result<()> {
        match self.last_error() {
            Some(message) => Err(anyhow!("{what}: {message}")),
            None => Ok(()),
        }
    }
}

impl Drop for Audio {
    fn drop(&mut self) {
        unsafe { rtaudio_destroy(self.0) };
    }
}

fn resolve_api(name: &str) -> Result<rtaudio_api_t> {
    let raw = std::ffi::CString::new(name).context("API name contains a NUL byte")?;
    let api = unsafe { rtaudio_compiled_api_by_name(raw.as_ptr()) };
    if api == RTAUDIO_API_UNSPECIFIED {
        bail!("'{name}' is not a compiled audio API (see `rtaudio-probe apis`)");
    }
    Ok(api)
}

fn c_text(ptr: *const core::ffi::c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn list_apis() -> Result<()> {
    println!("rtaudio {}", c_text(rtaudio_version()));
    let mut cursor = rtaudio_compiled_api();
    if cursor.is_null() {
        bail!("no compiled API list available");
    }
    unsafe {
        while *cursor != RTAUDIO_API_UNSPECIFIED {
            println!(
                "  {:<8} {}",
                c_text(rtaudio_api_name(*cursor)),
                c_text(rtaudio_api_display_name(*cursor))
            );
            cursor = cursor.add(1);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct DeviceRow {
    id: u32,
    name: String,
    probed: bool,
    output_channels: u32,
    input_channels: u32,
    duplex_channels: u32,
    default_output: bool,
    default_input: bool,
    native_formats: u64,
    preferred_sample_rate: u32,
    sample_rates: Vec<u32>,
}

impl DeviceRow {
    fn new(id: u32, info: &rtaudio_device_info_t) -> Self {
        Self {
            id,
            name: c_text(info.name.as_ptr()),
            probed: info.probed != 0,
            output_channels: info.output_channels,
            input_channels: info.input_channels,
            duplex_channels: info.duplex_channels,
            default_output: info.is_default_output != 0,
            default_input: info.is_default_input != 0,
            native_formats: info.native_formats as u64,
            preferred_sample_rate: info.preferred_sample_rate,
            sample_rates: info
                .sample_rates
                .iter()
                .take_while(|rate| **rate > 0)
                .map(|rate| *rate as u32)
                .collect(),
        }
    }
}

fn list_devices(args: DevicesArgs) -> Result<()> {
    let audio = Audio::open(args.api.as_deref())?;
    let api = unsafe { rtaudio_current_api(audio.0) };
    let count = unsafe { rtaudio_device_count(audio.0) };

    let mut rows = Vec::new();
    for id in 0..count {
        let info = unsafe { rtaudio_get_device_info(audio.0, id) };
        if let Some(message) = audio.last_error() {
            tracing::warn!(device = id, "probe failed: {message}");
        }
        rows.push(DeviceRow::new(id as u32, &info));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{} devices ({}):", rows.len(), c_text(rtaudio_api_display_name(api)));
    for row in &rows {
        if !row.probed {
            println!("  [{}] <probe failed>", row.id);
            continue;
        }
        let mut marks = String::new();
        if row.default_output {
            marks.push_str(" (default out)");
        }
        if row.default_input {
            marks.push_str(" (default in)");
        }
        println!(
            "  [{}] {}{marks}: {} out / {} in, rates {:?}, preferred {}",
            row.id,
            row.name,
            row.output_channels,
            row.input_channels,
            row.sample_rates,
            row.preferred_sample_rate
        );
    }
    Ok(())
}

struct Saw {
    channels: usize,
    phase: f32,
    step: f32,
}

unsafe extern "C" fn saw_cb(
    out: *mut c_void,
    _in: *mut c_void,
    nframes: c_uint,
    _time: f64,
    _status: rtaudio_stream_status_t,
    userdata: *mut c_void,
) -> c_int {
    let saw = &mut *(userdata as *mut Saw);
    let samples = core::slice::from_raw_parts_mut(out as *mut f32, nframes as usize * saw.channels);
    for frame in samples.chunks_exact_mut(saw.channels) {
        frame.fill(saw.phase * 0.2);
        saw.phase += saw.step;
        if saw.phase >= 1.0 {
            saw.phase -= 2.0;
        }
    }
    0
}

fn play(args: PlayArgs) -> Result<()> {
    if args.channels == 0 {
        bail!("at least one output channel is required");
    }
    // Declared before `audio` so it outlives the handle on every exit path.
    let mut saw = Box::new(Saw {
        channels: args.channels as usize,
        phase: 0.0,
        step: 2.0 * 220.0 / args.sample_rate as f32,
    });
    let audio = Audio::open(args.api.as_deref())?;
    let device = match args.device {
        Some(device) => device,
        None => unsafe { rtaudio_get_default_output_device(audio.0) },
    };
    let mut output = rtaudio_stream_parameters_t {
        device_id: device,
        num_channels: args.channels,
        first_channel: 0,
    };
    let mut frames = args.buffer_frames;
    let rc = unsafe {
        rtaudio_open_stream(
            audio.0,
            &mut output,
            core::ptr::null_mut(),
            RTAUDIO_FORMAT_FLOAT32,
            args.sample_rate,
            &mut frames,
            Some(saw_cb),
            saw.as_mut() as *mut Saw as *mut c_void,
            core::ptr::null_mut(),
            None,
        )
    };
    if rc != 0 {
        audio.check("opening the stream")?;
        bail!("opening the stream failed");
    }
    tracing::info!(device, frames, rate = args.sample_rate, "stream open");

    if unsafe { rtaudio_start_stream(audio.0) } != 0 {
        audio.check("starting the stream")?;
    }
    std::thread::sleep(Duration::from_secs_f64(args.seconds.max(0.0)));
    if unsafe { rtaudio_stop_stream(audio.0) } != 0 {
        audio.check("stopping the stream")?;
    }
    let played = unsafe { rtaudio_get_stream_time(audio.0) };
    unsafe { rtaudio_close_stream(audio.0) };
    println!("played {played:.3}s at {} Hz in {frames}-frame buffers", args.sample_rate);
    Ok(())
}
