use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sensorview_wire::{decode_binary, encode_ack, ControlCommand, Envelope};
use tracing::{debug, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::cmd::{parse_duration, WatchArgs};
use crate::exit::{websocket_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_message, MessageRecord, OutputFormat};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let command = initial_command(&args)?;

    let mut socket = connect_with_timeout(&args.url, timeout)?;
    if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
        stream
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|err| crate::exit::io_error("socket setup failed", err))?;
    }

    if let Some(command) = command {
        socket
            .send(Message::Text(command.to_json()))
            .map_err(|err| websocket_error("send failed", err))?;
        debug!(?command, "control command sent");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let message = match socket.read() {
            Ok(message) => message,
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(tungstenite::Error::Io(err)) if err.kind() == ErrorKind::ConnectionReset => break,
            Err(
                tungstenite::Error::ConnectionClosed
                | tungstenite::Error::AlreadyClosed
                | tungstenite::Error::Protocol(
                    tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
                ),
            ) => break,
            Err(err) => return Err(websocket_error("receive failed", err)),
        };

        let record = match message {
            Message::Binary(data) => {
                let envelope = match decode_binary(&data) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(error = %err, len = data.len(), "undecodable message");
                        continue;
                    }
                };
                if !args.no_ack && !matches!(envelope, Envelope::Ack { .. }) {
                    socket
                        .send(Message::Binary(encode_ack(envelope.kind()).to_vec()))
                        .map_err(|err| websocket_error("ack failed", err))?;
                }
                MessageRecord::from_envelope(&envelope, data.len())
            }
            Message::Text(text) => MessageRecord::from_text(&text),
            Message::Close(_) => break,
            _ => continue,
        };

        print_message(&record, format);
        printed = printed.saturating_add(1);
        if args.count.is_some_and(|count| printed >= count) {
            let _ = socket.close(None);
            let _ = socket.flush();
            return Ok(SUCCESS);
        }
    }

    Ok(SUCCESS)
}

fn initial_command(args: &WatchArgs) -> CliResult<Option<ControlCommand>> {
    if let Some(id) = &args.track {
        return Ok(Some(ControlCommand::Track(id.clone())));
    }
    let Some(control) = args.control.as_deref() else {
        return Ok(None);
    };
    match control {
        "reset" => Ok(Some(ControlCommand::Reset)),
        "stop" => Ok(Some(ControlCommand::Stop)),
        "load_pt_db" => Ok(Some(ControlCommand::LoadDatabase)),
        other => Err(CliError::new(
            USAGE,
            format!("unknown control command: {other} (expected reset, stop or load_pt_db)"),
        )),
    }
}

fn connect_with_timeout(url: &str, timeout: Duration) -> CliResult<Socket> {
    let start = Instant::now();
    loop {
        match tungstenite::connect(url) {
            Ok((socket, _response)) => return Ok(socket),
            Err(err) => {
                if !is_retryable_connect_error(&err) {
                    return Err(websocket_error("connect failed", err));
                }
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect timed out after {timeout:?}"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn is_retryable_connect_error(err: &tungstenite::Error) -> bool {
    match err {
        tungstenite::Error::Io(source) => matches!(
            source.kind(),
            ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::NotFound
        ),
        _ => false,
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
