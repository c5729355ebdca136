//! Session-level task registry with tab-switch semantics.
//!
//! The front end shows one tab per task (DO control, DI monitor, AI
//! capture, AO generator); switching tabs pauses the hidden tasks and
//! resumes the visible one. Pausing only suspends a worker loop; state and
//! device handles survive until the session itself is dropped, which tears
//! all workers down and releases the handles.

use indexmap::IndexMap;
use log::info;

use crate::capture::AiSampler;
use crate::error::Result;
use crate::generator::AoGenerator;
use crate::sampler::DiSampler;
use crate::streamer::DoStreamer;
use crate::utils::DeviceDescription;

/// Common control surface of the worker-loop tasks a session owns.
pub trait StreamTask: Send {
    /// Suspends the loop, keeping state and device handle alive.
    fn pause(&self);
    /// Restarts the loop; may fail on a start precondition.
    fn resume(&self) -> Result<()>;
    fn is_running(&self) -> bool;
}

impl StreamTask for DoStreamer {
    fn pause(&self) {
        DoStreamer::pause(self);
    }
    fn resume(&self) -> Result<()> {
        DoStreamer::resume(self)
    }
    fn is_running(&self) -> bool {
        DoStreamer::is_running(self)
    }
}

impl StreamTask for DiSampler {
    fn pause(&self) {
        self.stop_reading();
    }
    fn resume(&self) -> Result<()> {
        self.start_reading();
        Ok(())
    }
    fn is_running(&self) -> bool {
        DiSampler::is_running(self)
    }
}

impl StreamTask for AiSampler {
    fn pause(&self) {
        self.stop_reading();
    }
    fn resume(&self) -> Result<()> {
        self.start_reading();
        Ok(())
    }
    fn is_running(&self) -> bool {
        AiSampler::is_running(self)
    }
}

impl StreamTask for AoGenerator {
    fn pause(&self) {
        AoGenerator::pause(self);
    }
    fn resume(&self) -> Result<()> {
        AoGenerator::resume(self)
    }
    fn is_running(&self) -> bool {
        AoGenerator::is_running(self)
    }
}

/// Insertion-ordered registry of named tasks attached to one device.
pub struct Session {
    description: DeviceDescription,
    tasks: IndexMap<String, Box<dyn StreamTask>>,
}

impl Session {
    pub fn new(description: DeviceDescription) -> Self {
        Self {
            description,
            tasks: IndexMap::new(),
        }
    }

    pub fn description(&self) -> &DeviceDescription {
        &self.description
    }

    /// Registers a task under a unique name. Duplicate names are a
    /// programmer error and panic.
    pub fn add_task(&mut self, name: &str, task: Box<dyn StreamTask>) {
        assert!(
            !self.tasks.contains_key(name),
            "Session {} already has a task named {}",
            self.description,
            name
        );
        self.tasks.insert(name.to_string(), task);
    }

    /// Shortcut to borrow a task by name.
    pub fn task(&self, name: &str) -> &dyn StreamTask {
        match self.tasks.get(name) {
            Some(task) => task.as_ref(),
            None => panic!("Session {} does not have task {}", self.description, name),
        }
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.keys().map(|name| name.as_str()).collect()
    }

    /// Tab-switch hook: resumes the named task and pauses every other one.
    pub fn activate(&self, name: &str) -> Result<()> {
        for (task_name, task) in &self.tasks {
            if task_name != name {
                task.pause();
            }
        }
        info!("activating task {} on {}", name, self.description);
        self.task(name).resume()
    }

    /// Suspends every task, e.g. when the window is minimized.
    pub fn pause_all(&self) {
        for task in self.tasks.values() {
            task.pause();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FlagTask {
        running: Arc<AtomicBool>,
    }

    impl StreamTask for FlagTask {
        fn pause(&self) {
            self.running.store(false, Ordering::SeqCst);
        }
        fn resume(&self) -> Result<()> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    fn flag_session() -> (Session, Arc<AtomicBool>, Arc<AtomicBool>) {
        let mut session = Session::new("USB-4704,BID#0".parse().unwrap());
        let first = Arc::new(AtomicBool::new(true));
        let second = Arc::new(AtomicBool::new(true));
        session.add_task(
            "DO",
            Box::new(FlagTask {
                running: Arc::clone(&first),
            }),
        );
        session.add_task(
            "DI",
            Box::new(FlagTask {
                running: Arc::clone(&second),
            }),
        );
        (session, first, second)
    }

    #[test]
    fn activate_pauses_siblings() {
        let (session, first, second) = flag_session();
        session.activate("DO").unwrap();
        assert!(first.load(Ordering::SeqCst));
        assert!(!second.load(Ordering::SeqCst));

        session.activate("DI").unwrap();
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }

    #[test]
    fn pause_all_suspends_everything() {
        let (session, first, second) = flag_session();
        session.pause_all();
        assert!(!first.load(Ordering::SeqCst));
        assert!(!second.load(Ordering::SeqCst));
    }

    #[test]
    fn task_names_keep_insertion_order() {
        let (session, _, _) = flag_session();
        assert_eq!(session.task_names(), vec!["DO", "DI"]);
    }

    #[test]
    #[should_panic(expected = "does not have task")]
    fn unknown_task_panics() {
        let (session, _, _) = flag_session();
        session.task("AO");
    }

    #[test]
    #[should_panic(expected = "already has a task named")]
    fn duplicate_task_name_panics() {
        let (mut session, _, _) = flag_session();
        session.add_task(
            "DO",
            Box::new(FlagTask {
                running: Arc::new(AtomicBool::new(false)),
            }),
        );
    }
}
