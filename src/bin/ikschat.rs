/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::env;
use std::io::Write;
use std::io::stdin;
use std::io::stdout;
use std::process;
use std::process::ExitCode;
use std::sync::mpsc::Receiver;
use std::thread;

use tracing_subscriber::EnvFilter;

use ikschat::CertificateCheck;
use ikschat::ChannelEvent;
use ikschat::ClientError;
use ikschat::Config;
use ikschat::DEFAULT_CONFIG_FILE;
use ikschat::MessageChannel;
use ikschat::Session;
use ikschat::connect;
use ikschat::constants::DEFAULT_LOG_FILTER;
use ikschat::constants::MESSAGE_NAME;
use ikschat::resolve;

fn print_version() {
    println!("ikschat (iksemel) v{}", ikschat::VERSION);
}

fn print_usage() {
    println!(
        concat!(
            "Usage: ikschat [OPTIONS]\n",
            "This tool sends and receives chat messages over XMPP.\n",
            "Options:\n",
            "  -c, --config <FILE>        Configuration file (default: {})\n",
            "  -s, --server <HOST[:PORT]> Connect to this server instead of the SRV lookup\n",
            "      --verify               Validate the server certificate\n",
            "  -d, --debug                Also log the internals (protocol traffic is always shown)\n",
            "  -h, --help                 Display this help message and exit\n",
            "  -v, --version              Display the version and exit\n",
            "Report issues at https://github.com/meduketto/iksemel-rust/issues"
        ),
        DEFAULT_CONFIG_FILE
    );
}

fn init_logging(debug: bool) {
    let filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug {
        EnvFilter::new("ikschat=debug")
    } else {
        EnvFilter::new(DEFAULT_LOG_FILTER)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(stdout)
        .init();
}

fn display(events: Receiver<ChannelEvent>) {
    for event in events {
        match event {
            ChannelEvent::Stanza(stanza) => {
                if stanza.local_name == MESSAGE_NAME && !stanza.character_data.is_empty() {
                    let from = stanza.attribute("from").unwrap_or("?");
                    println!("\n{from}: {}", stanza.character_data);
                }
            }
            ChannelEvent::Closed => {
                println!("\nServer closed the stream");
                process::exit(0);
            }
            ChannelEvent::Failed(err) => {
                eprintln!("\nError: {err}");
                process::exit(1);
            }
        }
    }
}

fn run(config_file: &str, server: Option<&str>, check: CertificateCheck) -> Result<(), ClientError> {
    let mut config = Config::load(config_file)?;
    config.fill_password(|prompt| rpassword::prompt_password(prompt))?;
    let jid = config.jid()?;

    let endpoint = resolve(&config.server_name, server)?;
    let stream = connect(&endpoint.host, endpoint.port)?;
    let mut session = Session::new(stream, jid, &config.password).with_certificate_check(check);
    session.handshake()?;

    let (mut sender, events) = MessageChannel::open(session)?.split();
    thread::spawn(move || display(events));

    let mut line = String::new();
    loop {
        print!("Enter text: ");
        stdout().flush()?;
        line.clear();
        if stdin().read_line(&mut line)? == 0 {
            return Ok(());
        }
        sender.send(&config.message_for(&line))?;
    }
}

fn main() -> ExitCode {
    let mut args = env::args();
    let mut config_file = DEFAULT_CONFIG_FILE.to_string();
    let mut server: Option<String> = None;
    let mut check = CertificateCheck::Skip;
    let mut debug = false;

    // Skip the first argument (program name)
    args.next();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                if let Some(value) = args.next() {
                    config_file = value;
                } else {
                    eprintln!("Error: file name expected after {arg}");
                    return ExitCode::FAILURE;
                }
            }
            "-s" | "--server" => {
                if let Some(value) = args.next() {
                    server = Some(value);
                } else {
                    eprintln!("Error: server address expected after {arg}");
                    return ExitCode::FAILURE;
                }
            }
            "--verify" => check = CertificateCheck::WebPki,
            "-d" | "--debug" => debug = true,
            "-h" | "--help" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "-v" | "--version" => {
                print_version();
                return ExitCode::SUCCESS;
            }
            _ => {
                eprintln!("Error: unknown option {arg}");
                return ExitCode::FAILURE;
            }
        }
    }

    init_logging(debug);
    match run(&config_file, server.as_deref(), check) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
