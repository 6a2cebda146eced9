//! Narration port: optional text-to-speech behind a small trait.
//!
//! The speech backend is a single shared resource: every handle to it talks
//! to the same voice, a new `speak` supersedes whatever is playing, and
//! `stop` silences it. Failures never reach the caller.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// Optional speech capability used by the playback engine.
pub trait Narrator {
    /// Whether speech can be produced at all in this environment.
    fn is_available(&self) -> bool;

    /// Speak `text`, superseding any utterance still in flight.
    fn speak(&mut self, text: &str);

    /// Silence any in-flight utterance. Idempotent.
    fn stop(&mut self);
}

impl<N: Narrator + ?Sized> Narrator for Box<N> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn speak(&mut self, text: &str) {
        (**self).speak(text)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

/// Speech rate and pitch, relative to the backend's defaults (1.0 = default).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NarrationSettings {
    pub rate: f32,
    pub pitch: f32,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.0,
        }
    }
}

impl NarrationSettings {
    /// Base speaking rate of espeak and `say`, in words per minute.
    pub const BASE_WPM: f32 = 175.0;

    pub fn words_per_minute(&self) -> u32 {
        (Self::BASE_WPM * self.rate.clamp(0.1, 10.0)).round() as u32
    }
}

/// No speech backend. Playback runs silently.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNarrator;

impl Narrator for SilentNarrator {
    fn is_available(&self) -> bool {
        false
    }

    fn speak(&mut self, _text: &str) {}

    fn stop(&mut self) {}
}

/// A narration request captured by [`RecordingNarrator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum NarrationCommand {
    Speak(String),
    Stop,
}

/// Records narration requests instead of producing audio.
///
/// Clones share one log, so a host can keep a handle while the engine owns
/// another and drain the commands to a real speech API later.
#[derive(Debug, Clone)]
pub struct RecordingNarrator {
    available: bool,
    log: Rc<RefCell<Vec<NarrationCommand>>>,
}

impl RecordingNarrator {
    pub fn available() -> Self {
        Self {
            available: true,
            log: Rc::default(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            log: Rc::default(),
        }
    }

    /// Snapshot of everything recorded so far.
    pub fn commands(&self) -> Vec<NarrationCommand> {
        self.log.borrow().clone()
    }

    /// Drain the recorded commands.
    pub fn take(&self) -> Vec<NarrationCommand> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    /// Texts passed to `speak`, in call order.
    pub fn spoken(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter_map(|c| match c {
                NarrationCommand::Speak(text) => Some(text.clone()),
                NarrationCommand::Stop => None,
            })
            .collect()
    }

    pub fn speak_count(&self) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|c| matches!(c, NarrationCommand::Speak(_)))
            .count()
    }
}

impl Narrator for RecordingNarrator {
    fn is_available(&self) -> bool {
        self.available
    }

    fn speak(&mut self, text: &str) {
        self.log
            .borrow_mut()
            .push(NarrationCommand::Speak(text.to_string()));
    }

    fn stop(&mut self) {
        self.log.borrow_mut().push(NarrationCommand::Stop);
    }
}

/// Host speech programs the command narrator knows how to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechProgram {
    /// `espeak-ng` or `espeak`.
    Espeak(String),
    /// macOS `say`.
    Say,
    /// speech-dispatcher's `spd-say`.
    SpdSay,
    /// Anything else: invoked with the text as its only argument. Never
    /// run just to check that it exists.
    Custom(String),
}

impl SpeechProgram {
    /// Search order used by [`CommandNarrator::detect`].
    pub const CANDIDATES: [&'static str; 4] = ["espeak-ng", "espeak", "say", "spd-say"];

    pub fn from_name(name: &str) -> Self {
        match name {
            "espeak-ng" | "espeak" => Self::Espeak(name.to_string()),
            "say" => Self::Say,
            "spd-say" => Self::SpdSay,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn binary(&self) -> &str {
        match self {
            Self::Espeak(name) | Self::Custom(name) => name,
            Self::Say => "say",
            Self::SpdSay => "spd-say",
        }
    }

    /// Arguments for speaking `text` with `settings`.
    pub fn speak_args(&self, text: &str, settings: &NarrationSettings) -> Vec<String> {
        match self {
            Self::Espeak(_) => {
                // espeak pitch runs 0..=99 with 50 as the default voice.
                let pitch = (50.0 * settings.pitch).clamp(0.0, 99.0).round() as u32;
                vec![
                    "-s".to_string(),
                    settings.words_per_minute().to_string(),
                    "-p".to_string(),
                    pitch.to_string(),
                    "--".to_string(),
                    text.to_string(),
                ]
            }
            Self::Say => vec![
                "-r".to_string(),
                settings.words_per_minute().to_string(),
                "--".to_string(),
                text.to_string(),
            ],
            Self::SpdSay => {
                let rate = ((settings.rate - 1.0) * 100.0).clamp(-100.0, 100.0).round() as i32;
                let pitch = ((settings.pitch - 1.0) * 100.0).clamp(-100.0, 100.0).round() as i32;
                vec![
                    "-C".to_string(),
                    "-r".to_string(),
                    rate.to_string(),
                    "-p".to_string(),
                    pitch.to_string(),
                    "--".to_string(),
                    text.to_string(),
                ]
            }
            // Unknown option syntax, so no separator.
            Self::Custom(_) => vec![text.to_string()],
        }
    }

    /// spd-say hands speech to a daemon, so killing the child is not enough.
    fn stop_args(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::SpdSay => Some(&["-S"]),
            _ => None,
        }
    }
}

/// Narrates by running a host speech program, one child process per line.
///
/// Clones share the running child so every handle drives the same voice.
#[derive(Debug, Clone)]
pub struct CommandNarrator {
    program: Option<SpeechProgram>,
    settings: NarrationSettings,
    child: Arc<Mutex<Option<Child>>>,
}

impl CommandNarrator {
    /// Use the first speech program found on this host, if any.
    pub fn detect(settings: NarrationSettings) -> Self {
        let program = SpeechProgram::CANDIDATES
            .iter()
            .map(|name| SpeechProgram::from_name(name))
            .find(is_runnable);
        match &program {
            Some(p) => log::info!("narration: using {}", p.binary()),
            None => log::info!("narration: no speech program found"),
        }
        Self::with_program(program, settings)
    }

    /// Use a named program; unavailable if it cannot be run.
    pub fn named(name: &str, settings: NarrationSettings) -> Self {
        let program = SpeechProgram::from_name(name);
        if is_runnable(&program) {
            Self::with_program(Some(program), settings)
        } else {
            log::warn!("narration: speech program {name:?} is not runnable");
            Self::with_program(None, settings)
        }
    }

    pub fn with_program(program: Option<SpeechProgram>, settings: NarrationSettings) -> Self {
        Self {
            program,
            settings,
            child: Arc::new(Mutex::new(None)),
        }
    }

    pub fn program(&self) -> Option<&SpeechProgram> {
        self.program.as_ref()
    }

    fn kill_current(&self) {
        let mut slot = match self.child.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut child) = slot.take() {
            // Already-exited children report an error here; that is fine.
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn is_runnable(program: &SpeechProgram) -> bool {
    match program {
        // Arbitrary programs may speak or block on `--version`.
        SpeechProgram::Custom(name) => find_executable(name).is_some(),
        _ => Command::new(program.binary())
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok(),
    }
}

/// Resolve `name` the way the shell would: as a path when it has a
/// separator, otherwise through each `PATH` entry.
fn find_executable(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .flat_map(|dir| {
            let candidate = dir.join(name);
            let with_exe = cfg!(windows).then(|| candidate.with_extension("exe"));
            std::iter::once(candidate).chain(with_exe)
        })
        .find(|candidate| candidate.is_file())
}

impl Narrator for CommandNarrator {
    fn is_available(&self) -> bool {
        self.program.is_some()
    }

    fn speak(&mut self, text: &str) {
        let Some(program) = self.program.as_ref() else {
            return;
        };
        self.kill_current();

        let spawned = Command::new(program.binary())
            .args(program.speak_args(text, &self.settings))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => {
                let mut slot = match self.child.lock() {
                    Ok(slot) => slot,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *slot = Some(child);
            }
            Err(e) => log::warn!("narration: failed to run {}: {e}", program.binary()),
        }
    }

    fn stop(&mut self) {
        self.kill_current();
        let Some(program) = self.program.as_ref() else {
            return;
        };
        if let Some(args) = program.stop_args() {
            if let Err(e) = Command::new(program.binary())
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                log::warn!("narration: failed to stop {}: {e}", program.binary());
            }
        }
    }
}

impl Drop for CommandNarrator {
    fn drop(&mut self) {
        // Last handle out silences the voice.
        if Arc::strong_count(&self.child) == 1 {
            self.kill_current();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_narrator_is_unavailable() {
        let mut n = SilentNarrator;
        assert!(!n.is_available());
        n.speak("Do you like fishsticks?");
        n.stop();
    }

    #[test]
    fn recording_narrator_shares_log_between_clones() {
        let handle = RecordingNarrator::available();
        let mut engine_side = handle.clone();
        engine_side.speak("Do you like fishsticks?");
        engine_side.stop();
        engine_side.speak("Yeah!");

        assert_eq!(handle.speak_count(), 2);
        assert_eq!(handle.spoken(), ["Do you like fishsticks?", "Yeah!"]);
        assert_eq!(handle.take().len(), 3);
        assert!(handle.commands().is_empty());
    }

    #[test]
    fn boxed_narrator_delegates() {
        let recorder = RecordingNarrator::unavailable();
        let mut boxed: Box<dyn Narrator> = Box::new(recorder.clone());
        assert!(!boxed.is_available());
        boxed.speak("...");
        assert_eq!(recorder.spoken(), ["..."]);
    }

    #[test]
    fn settings_map_to_espeak_flags() {
        let settings = NarrationSettings {
            rate: 1.0,
            pitch: 1.0,
        };
        let args = SpeechProgram::from_name("espeak-ng").speak_args("Yeah!", &settings);
        assert_eq!(args, ["-s", "175", "-p", "50", "--", "Yeah!"]);

        let slow = NarrationSettings {
            rate: 0.8,
            pitch: 1.0,
        };
        assert_eq!(slow.words_per_minute(), 140);
        assert_eq!(NarrationSettings::default().rate, 0.9);
    }

    #[test]
    fn spd_say_args_are_relative() {
        let settings = NarrationSettings {
            rate: 0.9,
            pitch: 1.2,
        };
        let args = SpeechProgram::SpdSay.speak_args("Aye!", &settings);
        assert_eq!(args, ["-C", "-r", "-10", "-p", "20", "--", "Aye!"]);
        assert_eq!(SpeechProgram::SpdSay.stop_args(), Some(&["-S"][..]));
    }

    #[test]
    fn dash_leading_text_is_not_an_option() {
        let settings = NarrationSettings {
            rate: 1.0,
            pitch: 1.0,
        };
        let args = SpeechProgram::Say.speak_args("-v Zarvox", &settings);
        assert_eq!(args, ["-r", "175", "--", "-v Zarvox"]);

        let args = SpeechProgram::from_name("espeak").speak_args("--help", &settings);
        assert_eq!(&args[args.len() - 2..], ["--", "--help"]);

        let custom = SpeechProgram::Custom("festival".to_string());
        assert_eq!(custom.speak_args("-x", &settings), ["-x"]);
    }

    #[test]
    fn program_names() {
        assert_eq!(SpeechProgram::from_name("say"), SpeechProgram::Say);
        assert_eq!(
            SpeechProgram::from_name("festival"),
            SpeechProgram::Custom("festival".to_string())
        );
        assert_eq!(SpeechProgram::from_name("espeak").binary(), "espeak");
    }

    #[test]
    fn command_narrator_without_program_is_silent() {
        let mut n = CommandNarrator::with_program(None, NarrationSettings::default());
        assert!(!n.is_available());
        n.speak("nothing happens");
        n.stop();
    }

    #[test]
    fn missing_program_is_unavailable() {
        let n = CommandNarrator::named(
            "definitely-not-a-speech-program-4711",
            NarrationSettings::default(),
        );
        assert!(!n.is_available());
    }

    #[test]
    fn custom_program_found_without_running_it() {
        assert!(find_executable("definitely-not-a-speech-program-4711").is_none());
        assert!(find_executable("/no/such/dir/speaker").is_none());
        #[cfg(unix)]
        {
            assert!(find_executable("sh").is_some());
            assert!(find_executable("/bin/sh").is_some());
            let n = CommandNarrator::named("cat", NarrationSettings::default());
            assert!(n.is_available());
            assert_eq!(n.program(), Some(&SpeechProgram::Custom("cat".to_string())));
        }
    }

    #[cfg(unix)]
    fn running_pid(n: &CommandNarrator) -> Option<u32> {
        n.child.lock().unwrap().as_ref().map(Child::id)
    }

    #[cfg(unix)]
    fn reaped(pid: u32) -> bool {
        if cfg!(target_os = "linux") {
            !Path::new(&format!("/proc/{pid}")).exists()
        } else {
            true
        }
    }

    #[cfg(unix)]
    #[test]
    fn new_speech_supersedes_running_child() {
        let mut n = CommandNarrator::with_program(
            Some(SpeechProgram::Custom("sleep".to_string())),
            NarrationSettings::default(),
        );
        let handle = n.clone();

        n.speak("5");
        let first = running_pid(&handle).expect("first child running");
        n.speak("5");
        let second = running_pid(&handle).expect("second child running");
        assert_ne!(first, second);
        assert!(reaped(first), "first child {first} still alive");

        n.stop();
        assert_eq!(running_pid(&handle), None);
        assert!(reaped(second), "second child {second} still alive");

        // Stopping again is harmless.
        n.stop();
        assert_eq!(running_pid(&handle), None);
    }

    #[cfg(unix)]
    #[test]
    fn last_handle_dropped_silences_voice() {
        let mut n = CommandNarrator::with_program(
            Some(SpeechProgram::Custom("sleep".to_string())),
            NarrationSettings::default(),
        );
        let other = n.clone();
        n.speak("5");
        let pid = running_pid(&n).expect("child running");

        drop(other);
        assert_eq!(running_pid(&n), Some(pid));

        drop(n);
        assert!(reaped(pid), "child {pid} still alive");
    }
}
