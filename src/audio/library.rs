/// Sample library - loads the drum kit once, off the UI thread
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use super::kit::DrumKit;
use super::AudioError;

#[derive(Debug, Clone)]
pub enum KitSource {
    Directory(PathBuf),
    Synthesized { sample_rate: u32 },
}

impl KitSource {
    fn load(self) -> Result<DrumKit, AudioError> {
        match self {
            KitSource::Directory(dir) => DrumKit::from_dir(&dir),
            KitSource::Synthesized { sample_rate } => Ok(DrumKit::synthesized(sample_rate)),
        }
    }
}

pub enum LibraryState {
    Unloaded,
    Loading(Receiver<Result<DrumKit, AudioError>>),
    Ready(Arc<DrumKit>),
}

pub struct SampleLibrary {
    state: LibraryState,
}

impl SampleLibrary {
    pub fn new() -> Self {
        Self {
            state: LibraryState::Unloaded,
        }
    }

    /// Start loading in the background. Calls while a load is in flight or
    /// after the kit is ready do nothing.
    pub fn load(&mut self, source: KitSource) {
        if !matches!(self.state, LibraryState::Unloaded) {
            log::debug!("Sample library already loading or loaded");
            return;
        }

        log::info!("Loading drum kit from {:?}", source);
        let (sender, receiver) = channel();
        thread::spawn(move || {
            let _ = sender.send(source.load());
        });
        self.state = LibraryState::Loading(receiver);
    }

    /// Pick up a finished load. Returns true when the kit became ready.
    /// A failed load is logged and the library goes back to unloaded.
    pub fn poll(&mut self) -> bool {
        let LibraryState::Loading(receiver) = &self.state else {
            return false;
        };
        match receiver.try_recv() {
            Ok(result) => self.finish(result),
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                log::error!("Sample loader exited without a result");
                self.state = LibraryState::Unloaded;
                false
            }
        }
    }

    /// Block until an in-flight load finishes.
    pub fn wait(&mut self) -> bool {
        let LibraryState::Loading(receiver) = &self.state else {
            return self.is_ready();
        };
        match receiver.recv() {
            Ok(result) => self.finish(result),
            Err(_) => {
                log::error!("Sample loader exited without a result");
                self.state = LibraryState::Unloaded;
                false
            }
        }
    }

    fn finish(&mut self, result: Result<DrumKit, AudioError>) -> bool {
        match result {
            Ok(kit) => {
                log::info!("Drum kit ready");
                self.state = LibraryState::Ready(Arc::new(kit));
                true
            }
            Err(e) => {
                log::error!("Failed to load drum kit: {}", e);
                self.state = LibraryState::Unloaded;
                false
            }
        }
    }

    pub fn state(&self) -> &LibraryState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, LibraryState::Ready(_))
    }

    pub fn kit(&self) -> Option<&Arc<DrumKit>> {
        match &self.state {
            LibraryState::Ready(kit) => Some(kit),
            _ => None,
        }
    }
}

impl Default for SampleLibrary {
    fn default() -> Self {
        Self::new()
    }
}
