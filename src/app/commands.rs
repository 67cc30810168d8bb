//! Console control commands.

use std::str::FromStr;

/// A request from the front end to the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Open (or reopen) the sensing device on a port
    OpenSensor(String),
    /// Open (or reopen) the trigger peripheral on a port
    OpenTrigger(String),
    /// Close both links and reset calibration
    ClosePorts,
    /// Start a capture session
    Start {
        /// Frames per second
        frames_per_second: f64,
        /// Capture length in seconds
        duration_seconds: f64,
    },
    /// Cancel the running session
    Stop,
    /// Take the current values as the new zero
    Zero,
    /// Report links, capture progress and values
    Status,
    /// List serial ports
    ListPorts,
    /// Leave the event loop
    Quit,
}

/// One line per command, for `help`.
pub const HELP: &str = "\
open-sensor <port>     open the sensing device
open-trigger <port>    open the trigger peripheral
close                  close both ports and reset calibration
start <fps> <seconds>  start a capture
stop                   cancel the running capture
zero                   zero the current values
status                 show links, progress and values
ports                  list serial ports
quit                   stop and exit";

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".to_string());
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_lowercase().as_str(), args.as_slice()) {
            ("open-sensor", [port]) => ControlCommand::OpenSensor((*port).to_string()),
            ("open-trigger", [port]) => ControlCommand::OpenTrigger((*port).to_string()),
            ("close", []) => ControlCommand::ClosePorts,
            ("start", [fps, secs]) => ControlCommand::Start {
                frames_per_second: parse_number(fps, "frames per second")?,
                duration_seconds: parse_number(secs, "capture length")?,
            },
            ("stop", []) => ControlCommand::Stop,
            ("zero", []) => ControlCommand::Zero,
            ("status", []) => ControlCommand::Status,
            ("ports", []) => ControlCommand::ListPorts,
            ("quit" | "exit", []) => ControlCommand::Quit,
            (
                "open-sensor" | "open-trigger" | "close" | "start" | "stop" | "zero" | "status"
                | "ports" | "quit" | "exit",
                _,
            ) => return Err(format!("wrong arguments for '{verb}'\n{HELP}")),
            _ => return Err(format!("unknown command '{verb}'\n{HELP}")),
        };
        Ok(command)
    }
}

fn parse_number(text: &str, name: &str) -> Result<f64, String> {
    text.parse()
        .map_err(|_| format!("{name} must be a number, got '{text}'"))
}
