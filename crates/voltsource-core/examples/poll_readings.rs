//! Power Supply Polling Tool
//!
//! Connects to a voltsource power supply and periodically polls the measured
//! voltage and current of both channels, printing each reading as it
//! arrives.
//!
//! Usage:
//!   cargo run --example poll_readings -- [OPTIONS]
//!
//! Options:
//!   --port PORT       Serial port (default: first enumerated port)
//!   --interval MS     Polling interval in ms (default: 500)
//!   --list            List available ports and exit

use std::time::Duration;

use voltsource_core::protocol::{
    list_ports, Channel, Command, ConnectionConfig, Engine, ReadingKey, Response, Sink,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voltsource_core=debug".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name: Option<String> = None;
    let mut interval_ms = 500u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    port_name = Some(args[i].clone());
                }
            }
            "--interval" | "-i" => {
                i += 1;
                if i < args.len() {
                    interval_ms = args[i].parse().unwrap_or(500);
                }
            }
            "--list" => {
                for port in list_ports() {
                    println!("{}  {:?}", port.name, port.product);
                }
                return;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                return;
            }
        }
        i += 1;
    }

    let port_name = match port_name.or_else(|| list_ports().first().map(|p| p.name.clone())) {
        Some(name) => name,
        None => {
            eprintln!("No serial ports found; pass one with --port");
            return;
        }
    };

    let engine = Engine::new(ConnectionConfig::default());

    engine.subscribe_status(|connected| {
        if connected {
            println!("Connected");
        } else {
            println!("Disconnected");
        }
    });

    for channel in Channel::all() {
        engine.set_reading_sink(ReadingKey::voltage(channel), move |resp| {
            if let Response::Voltage(mv) = resp {
                println!("ch{} voltage: {:5.3} V", channel.index(), mv as f64 / 1000.0);
            }
        });
        engine.set_reading_sink(ReadingKey::current(channel), move |resp| {
            if let Response::Current(ma) = resp {
                println!("ch{} current: {:5.3} A", channel.index(), ma as f64 / 1000.0);
            }
        });
    }

    println!("Connecting to {}...", port_name);
    engine.connect(&port_name);

    loop {
        if engine.is_connected() {
            for channel in Channel::all() {
                engine.send(
                    Command::ReadVoltage(channel),
                    Some(Sink::Reading(ReadingKey::voltage(channel))),
                );
                engine.send(
                    Command::ReadCurrent(channel),
                    Some(Sink::Reading(ReadingKey::current(channel))),
                );
            }
        }
        std::thread::sleep(Duration::from_millis(interval_ms));
    }
}
