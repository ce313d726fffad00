//! Viewer command callbacks.

use std::fmt;

use sensorview_wire::ControlCommand;

type Action = Box<dyn Fn() + Send + Sync>;
type TrackAction = Box<dyn Fn(&str) + Send + Sync>;

/// Handlers for commands sent by the viewer.
///
/// Built with chained setters; unset slots ignore their command. Callbacks run
/// on the transport's I/O thread, so they should return quickly.
///
/// ```
/// use sensorview_proxy::ControlCallbacks;
///
/// let callbacks = ControlCallbacks::new()
///     .on_reset(|| println!("reset"))
///     .on_track(|id| println!("track {id}"));
/// assert!(callbacks.has_track());
/// ```
#[derive(Default)]
pub struct ControlCallbacks {
    reset: Option<Action>,
    stop: Option<Action>,
    track: Option<TrackAction>,
    load_database: Option<Action>,
}

impl ControlCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_reset(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.reset = Some(Box::new(f));
        self
    }

    /// Also invoked when the viewer disconnects.
    pub fn on_stop(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.stop = Some(Box::new(f));
        self
    }

    pub fn on_track(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.track = Some(Box::new(f));
        self
    }

    pub fn on_load_database(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.load_database = Some(Box::new(f));
        self
    }

    pub fn has_track(&self) -> bool {
        self.track.is_some()
    }

    /// Run the callback for `command`. Returns `false` if its slot is empty.
    pub fn dispatch(&self, command: &ControlCommand) -> bool {
        match command {
            ControlCommand::Reset => run(&self.reset),
            ControlCommand::Stop => run(&self.stop),
            ControlCommand::LoadDatabase => run(&self.load_database),
            ControlCommand::Track(id) => match &self.track {
                Some(f) => {
                    f(id);
                    true
                }
                None => false,
            },
        }
    }
}

fn run(action: &Option<Action>) -> bool {
    match action {
        Some(f) => {
            f();
            true
        }
        None => false,
    }
}

impl fmt::Debug for ControlCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlCallbacks")
            .field("reset", &self.reset.is_some())
            .field("stop", &self.stop.is_some())
            .field("track", &self.track.is_some())
            .field("load_database", &self.load_database.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn dispatch_routes_to_one_slot() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let log = |name: &'static str| {
            let calls = Arc::clone(&calls);
            move || calls.lock().unwrap().push(name.to_string())
        };
        let track_calls = Arc::clone(&calls);
        let callbacks = ControlCallbacks::new()
            .on_reset(log("reset"))
            .on_stop(log("stop"))
            .on_load_database(log("load"))
            .on_track(move |id| track_calls.lock().unwrap().push(format!("track:{id}")));

        assert!(callbacks.dispatch(&ControlCommand::Reset));
        assert!(callbacks.dispatch(&ControlCommand::Track("7".into())));
        assert!(callbacks.dispatch(&ControlCommand::LoadDatabase));
        assert!(callbacks.dispatch(&ControlCommand::Stop));
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["reset", "track:7", "load", "stop"]
        );
    }

    #[test]
    fn empty_slots_report_unhandled() {
        let callbacks = ControlCallbacks::new();
        assert!(!callbacks.dispatch(&ControlCommand::Reset));
        assert!(!callbacks.dispatch(&ControlCommand::Track("1".into())));
        assert_eq!(
            format!("{callbacks:?}"),
            "ControlCallbacks { reset: false, stop: false, track: false, load_database: false }"
        );
    }
}
