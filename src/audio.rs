//! Playback of the audio summary.
//!
//! The controller is a small state machine over an injected
//! [`SpeechSynthesizer`]; it never touches a platform speech API directly.

use serde::{Deserialize, Serialize};
use std::process::{Child, Command, Stdio};

/// Identifies one spoken utterance so completion events can be matched.
pub type UtteranceId = u64;

pub trait SpeechSynthesizer {
    /// Start speaking `text` as utterance `id`.
    fn speak(&mut self, id: UtteranceId, text: &str);
    fn pause(&mut self);
    fn resume(&mut self);
    /// Cancel whatever is being spoken or is paused.
    fn cancel(&mut self);
}

pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> crate::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

pub struct AudioController<S: SpeechSynthesizer> {
    summary: String,
    synth: S,
    state: PlaybackState,
    current: Option<UtteranceId>,
    next_id: UtteranceId,
}

impl<S: SpeechSynthesizer> AudioController<S> {
    pub fn new(summary: impl Into<String>, synth: S) -> Self {
        Self {
            summary: summary.into(),
            synth,
            state: PlaybackState::Idle,
            current: None,
            next_id: 1,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// The utterance being spoken or paused, if any.
    pub fn current_utterance(&self) -> Option<UtteranceId> {
        self.current
    }

    pub fn synthesizer(&self) -> &S {
        &self.synth
    }

    pub fn synthesizer_mut(&mut self) -> &mut S {
        &mut self.synth
    }

    /// Start from idle, or resume the paused utterance.
    pub fn play(&mut self) {
        match self.state {
            PlaybackState::Idle => {
                let id = self.next_id;
                self.next_id += 1;
                self.current = Some(id);
                self.synth.speak(id, &self.summary);
                self.state = PlaybackState::Playing;
                tracing::debug!(utterance = id, "speech started");
            }
            PlaybackState::Paused => {
                self.synth.resume();
                self.state = PlaybackState::Playing;
            }
            PlaybackState::Playing => {}
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.synth.pause();
            self.state = PlaybackState::Paused;
        }
    }

    pub fn stop(&mut self) {
        if self.state != PlaybackState::Idle {
            self.synth.cancel();
            self.state = PlaybackState::Idle;
            self.current = None;
        }
    }

    /// Completion event from the synthesizer. Events for utterances that
    /// were already canceled are ignored.
    pub fn on_finished(&mut self, id: UtteranceId) {
        if self.current == Some(id) {
            self.state = PlaybackState::Idle;
            self.current = None;
            tracing::debug!(utterance = id, "speech finished");
        }
    }

    /// Independent of playback.
    pub fn copy_to_clipboard(&self, clipboard: &mut dyn Clipboard) -> crate::Result<()> {
        clipboard.write_text(&self.summary)
    }
}

impl<S: SpeechSynthesizer> Drop for AudioController<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Speaks through an external text-to-speech program such as `say` or
/// `espeak`. Pause and resume are not supported by such programs; the
/// utterance keeps playing.
pub struct CommandSynthesizer {
    command: String,
    args: Vec<String>,
    child: Option<(UtteranceId, Child)>,
    /// Utterance whose command could not be started.
    failed: Option<UtteranceId>,
}

impl CommandSynthesizer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            child: None,
            failed: None,
        }
    }

    /// Returns the utterance that ran to completion since the last poll.
    /// An utterance whose command never started is reported as finished
    /// on the first poll.
    pub fn poll_finished(&mut self) -> Option<UtteranceId> {
        if let Some(id) = self.failed.take() {
            return Some(id);
        }
        let (id, child) = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    tracing::warn!(%status, command = %self.command, "speech command failed");
                }
                let id = *id;
                self.child = None;
                Some(id)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not poll speech command");
                let id = *id;
                self.child = None;
                Some(id)
            }
        }
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&mut self, id: UtteranceId, text: &str) {
        self.cancel();
        let spawned = Command::new(&self.command)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => self.child = Some((id, child)),
            Err(e) => {
                tracing::warn!(error = %e, command = %self.command, "could not start speech command");
                self.failed = Some(id);
            }
        }
    }

    fn pause(&mut self) {
        tracing::warn!(command = %self.command, "pausing is not supported by speech commands");
    }

    fn resume(&mut self) {}

    fn cancel(&mut self) {
        self.failed = None;
        if let Some((_, mut child)) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
