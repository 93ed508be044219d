//! Pulselink CLI - real-time UDP peer with latency dashboard.

use std::process;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use parking_lot::Mutex;

use pulselink::cli::Cli;
use pulselink::config::{self, init_logging};
use pulselink::error::Result;
use pulselink::protocol::{RxPacket, TxPacket, MAX_FRAME_SIZE};
use pulselink::runtime::UdpRuntime;
use pulselink::sched::{EventLoop, PeriodicTimer};
use pulselink::signals::ShutdownFlag;
use pulselink::transport::UdpEndpoint;
use pulselink::ui::Dashboard;
use pulselink::VERSION;

/// Identifier stamped into every transmitted frame ("PSLK").
const TX_UNIQUE_ID: u32 = 0x50534C4B;

/// Fixed payload carried by the periodic TX tick.
static TX_PAYLOAD: &[u8] = b"pulselink hello";

fn main() {
    if let Err(e) = run() {
        eprintln!("pulselink: {e}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.validate()?;

    let cfg = cli.resolve_config()?;
    init_logging(&cfg.logging)?;
    if cli.no_color {
        colored::control::set_override(false);
    }

    let shutdown = ShutdownFlag::install()?;

    print_banner(&cli, &cfg);

    // Socket first: bind/connect failures are fatal before any thread runs.
    let endpoint = UdpEndpoint::connect(cli.src, cli.dst, &cfg.transport.socket_config())?;

    let ui = Arc::new(Dashboard::new());

    // RX state is written by the RX worker (decode + link health) and read
    // by the main thread's health tick; the dashboard is advisory, so a
    // reader seeing a mid-update snapshot is harmless.
    let rx_state = Arc::new(Mutex::new(RxPacket::with_monitor(cfg.monitor.build())));

    let handler = {
        let state = Arc::clone(&rx_state);
        let ui = Arc::clone(&ui);
        move |frame: &[u8]| {
            let mut rx = state.lock();
            match rx.decode(frame) {
                Ok(f) => {
                    ui.log(&format!(
                        "[RX] id 0x{:08X}, lifesign {}, len {}, interval {} us\n",
                        f.unique_id,
                        f.lifesign,
                        f.payload.len(),
                        rx.monitor().last_interval_us()
                    ));
                    if rx.monitor().is_unstable() {
                        ui.log(&format!(
                            "[RX] warning: unstable interval (streak {})\n",
                            rx.monitor().unstable_streak()
                        ));
                    }
                }
                Err(e) => {
                    // Corrupt frames are dropped here; they never reach
                    // the link monitor.
                    ui.log(&format!("[RX] decode failed: {e}\n"));
                }
            }
        }
    };

    let runtime = UdpRuntime::start(
        &endpoint,
        &cfg.runtime.worker_config(cfg.stats.sampler_capacity),
        handler,
    )?;

    // Restore the terminal promptly when a signal lands, before the
    // shutdown summary prints.
    {
        let ui = Arc::clone(&ui);
        shutdown.on_shutdown(move || ui.shutdown());
    }

    if !cli.no_dashboard {
        ui.init();
    }

    let loop_result;
    {
        let mut event_loop = EventLoop::new()?;

        // TX tick: encode the fixed payload and hand it to the TX worker.
        {
            let runtime = &runtime;
            let ui = Arc::clone(&ui);
            let mut tx_packet = TxPacket::new(TX_UNIQUE_ID);
            tx_packet.set_payload(TX_PAYLOAD)?;

            event_loop.add_timer(PeriodicTimer::new(config::TX_INTERVAL)?, move || {
                let mut buf = [0u8; MAX_FRAME_SIZE];
                match tx_packet.encode(&mut buf) {
                    Ok(len) => {
                        if runtime.queue_packet(&buf[..len]) {
                            ui.log(&format!(
                                "[TX] lifesign {}, queued {len} bytes (queue {})\n",
                                tx_packet.lifesign(),
                                runtime.tx_queue_len()
                            ));
                        } else {
                            ui.log("[TX] queue full, frame dropped\n");
                        }
                    }
                    Err(e) => ui.log(&format!("[TX] encode failed: {e}\n")),
                }
            })?;
        }

        // Health tick: surface loss of communication and worker death.
        {
            let runtime = &runtime;
            let state = Arc::clone(&rx_state);
            let ui = Arc::clone(&ui);
            event_loop.add_timer(PeriodicTimer::new(config::HEALTH_INTERVAL)?, move || {
                let rx = state.lock();
                let monitor = rx.monitor();
                if monitor.is_lost() {
                    ui.log(&format!(
                        "[MONITOR] communication lost: no lifesign change for {} ms (threshold {} ms)\n",
                        monitor.time_since_change().as_millis(),
                        monitor.comm_timeout().as_millis()
                    ));
                }
                if runtime.rx_failed() {
                    ui.log("[MONITOR] rx worker terminated on a socket error\n");
                }
            })?;
        }

        // Stats tick: refresh the pinned dashboard pane.
        {
            let runtime = &runtime;
            let ui = Arc::clone(&ui);
            event_loop.add_timer(PeriodicTimer::new(config::STATS_INTERVAL)?, move || {
                let tx = runtime.tx_sampler().snapshot();
                let rx = runtime.rx_sampler().snapshot();
                let interval = runtime.interval_sampler().snapshot();
                ui.update(&tx, &rx, &interval);
            })?;
        }

        loop_result = event_loop.run(shutdown.as_atomic());
    }

    // Registered shutdown callbacks (terminal restore) run first, so the
    // summary tables land on a sane terminal.
    shutdown.run_callbacks();
    ui.shutdown();

    println!("\nShutting down...");
    let mut runtime = runtime;
    runtime.shutdown();

    loop_result
}

fn print_banner(cli: &Cli, cfg: &pulselink::Config) {
    println!(
        "{}",
        "╔══════════════════════════════════════════╗".bright_cyan()
    );
    println!(
        "{}",
        "║     PULSELINK UDP PEER                   ║".bright_cyan()
    );
    println!(
        "{}",
        format!("║     Version {VERSION}                        ║").bright_cyan()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════╝".bright_cyan()
    );
    println!();
    println!("  {} {}", "Source:".bright_white(), cli.src);
    println!("  {} {}", "Destination:".bright_white(), cli.dst);
    println!(
        "  {} rx core {}, priority {}{}",
        "RX worker:".bright_white(),
        cfg.runtime
            .rx_core
            .map_or_else(|| "unpinned".into(), |c| c.to_string()),
        cfg.runtime.rx_priority,
        if cfg.runtime.realtime { " (SCHED_FIFO)" } else { "" }
    );
    println!(
        "  {} tx core {}, priority {}{}",
        "TX worker:".bright_white(),
        cfg.runtime
            .tx_core
            .map_or_else(|| "unpinned".into(), |c| c.to_string()),
        cfg.runtime.tx_priority,
        if cfg.runtime.realtime { " (SCHED_FIFO)" } else { "" }
    );
    println!(
        "  {} SO_RCVBUF {} bytes, SO_SNDBUF {} bytes",
        "Buffers:".bright_white(),
        cfg.transport.recv_buffer_size,
        cfg.transport.send_buffer_size
    );
    println!();
}
