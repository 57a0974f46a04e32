mod logging;

use std::io::{self, Read, Write};
use std::thread;

use clap::{CommandFactory, Parser};
use color_eyre::eyre::{Result, WrapErr};
use log::{debug, error};

use sofi_core::{Config, Endpoint, PacketReceiver};

#[derive(Parser, Debug)]
#[command(
    name = "sofi",
    about = "Pipe bytes over an audible point-to-point acoustic link",
    long_about = None
)]
struct Cli {
    /// Enable the receive direction (default: both directions)
    #[arg(short = 'R', long)]
    receiver: bool,

    /// Enable the send direction (default: both directions)
    #[arg(short = 'S', long)]
    sender: bool,

    /// Symbol rate in symbols per second
    #[arg(short, long)]
    baud: Option<f64>,

    /// Comma-separated tone table; 2, 4, 16 or 256 entries in Hz
    #[arg(short, long, value_delimiter = ',')]
    frequencies: Option<Vec<f64>>,

    /// Audio sample rate in Hz
    #[arg(short = 's', long)]
    sample_rate: Option<u32>,

    /// Listen-mode window length as a fraction of a symbol
    #[arg(short = 'w', long)]
    window: Option<f64>,

    /// Inter-packet gap in symbol durations
    #[arg(short = 'g', long)]
    gap: Option<f64>,

    /// Maximum bytes per outgoing packet
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u8).range(1..))]
    max_length: Option<u8>,

    /// Keep stdout open after a zero-length end-of-stream packet
    #[arg(short, long)]
    keep_open: bool,

    /// Log verbosity (0 = warnings only, 3 and up = trace)
    #[arg(short, long, default_value_t = 0)]
    debug_level: u8,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::default();
        // With neither flag given the endpoint runs full duplex.
        if self.receiver || self.sender {
            config.receiver = self.receiver;
            config.sender = self.sender;
        }
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        if let Some(frequencies) = self.frequencies {
            config.symbol_freqs = frequencies;
        }
        if let Some(sample_rate) = self.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(window) = self.window {
            config.recv_window_factor = window;
        }
        if let Some(gap) = self.gap {
            config.interpacket_gap_factor = gap;
        }
        if let Some(max_length) = self.max_length {
            config.max_packet_length = max_length;
        }
        config
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders its own usage; the exit code is pinned to 1 for
            // every argument problem rather than clap's default of 2.
            let is_help = matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            let _ = err.print();
            std::process::exit(if is_help { 0 } else { 1 });
        }
    };
    logging::init(cli.debug_level);
    let keep_open = cli.keep_open;

    let config = cli.into_config();
    if let Err(err) = config.validate() {
        eprintln!("sofi: {err}");
        eprintln!("{}", Cli::command().render_usage());
        std::process::exit(1);
    }

    let sender_enabled = config.sender;
    let receiver_enabled = config.receiver;
    let max_chunk = config.max_packet_length as usize;

    let mut endpoint = Endpoint::new(config).wrap_err("failed to start the acoustic endpoint")?;

    let receiver_thread = if receiver_enabled {
        let receiver = endpoint.receiver();
        let handle = thread::Builder::new()
            .name("sofi-stdout".into())
            .spawn(move || stdout_worker(receiver, keep_open))
            .wrap_err("failed to spawn the stdout worker")?;
        Some(handle)
    } else {
        None
    };

    if sender_enabled {
        stdin_worker(&mut endpoint, max_chunk)?;
        endpoint.drain();
    }

    if let Some(handle) = receiver_thread {
        let _ = handle.join();
    }

    Ok(())
}

/// Reads stdin in packet-sized chunks and queues each one for
/// transmission. An empty read ends the stream and sends the zero-length
/// end-of-stream packet.
fn stdin_worker(endpoint: &mut Endpoint, max_chunk: usize) -> Result<()> {
    let mut stdin = io::stdin().lock();
    let mut buf = vec![0u8; max_chunk];
    loop {
        let n = match stdin.read(&mut buf) {
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).wrap_err("reading stdin"),
        };
        endpoint
            .send(&buf[..n])
            .wrap_err("queueing packet for transmission")?;
        if n == 0 {
            debug!("stdin closed, end-of-stream packet queued");
            return Ok(());
        }
    }
}

/// Writes received payloads to stdout, flushing after each packet. A
/// zero-length packet marks end of stream and ends the worker unless
/// `keep_open` is set.
fn stdout_worker(receiver: PacketReceiver, keep_open: bool) {
    let mut stdout = io::stdout().lock();
    while let Some(payload) = receiver.recv() {
        if payload.is_empty() {
            debug!("end-of-stream packet received");
            if keep_open {
                continue;
            }
            return;
        }
        if let Err(err) = stdout
            .write_all(&payload)
            .and_then(|()| stdout.flush())
        {
            error!("stdout write failed: {err}");
            return;
        }
    }
}
