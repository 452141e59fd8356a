//! Detector trait and the built-in implementations.
//!
//! The scheduler asks a [`Detector`] for the detections visible on a source
//! once per tick. The trait abstracts the mechanism: a model embedded in
//! the process, an external script, or a test double. The scheduler
//! depends only on the signature and on the call eventually returning.
//!
//! - [`StubDetector`] emits random fire/smoke detections so the fan-out
//!   path can be exercised end-to-end without a model.
//! - [`ProcessDetector`] runs an external inference program per tick and
//!   parses its JSON output.

use std::process::Stdio;
use std::sync::Mutex;

use firewatch_types::{Detection, InvalidDetection};
use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tokio::process::Command;

/// Labels the stub detector picks from.
const STUB_LABELS: [&str; 2] = ["fire", "smoke"];

/// Probability that a stub tick produces no detection.
const STUB_EMPTY_PROBABILITY: f64 = 0.4;

/// Upper bound for stub bounding-box coordinates.
const STUB_MAX_COORD: i32 = 400;

/// Maximum number of stderr bytes kept in a [`DetectorError::Exit`].
const MAX_STDERR_LEN: usize = 512;

/// Errors a detector call can produce. Every variant is a per-tick fault:
/// the scheduler logs it and moves on to the next tick.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// The call did not finish within the scheduler's deadline.
    #[error("detector timed out for {source_id} (deadline: {timeout_ms}ms)")]
    Timeout {
        /// The source being inspected.
        source_id: String,
        /// The deadline in milliseconds.
        timeout_ms: u64,
    },

    /// The external program could not be started.
    #[error("failed to spawn detector program: {0}")]
    Spawn(#[from] std::io::Error),

    /// The external program exited unsuccessfully.
    #[error("detector program exited with {code:?}: {stderr}")]
    Exit {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Truncated standard error output.
        stderr: String,
    },

    /// The external program's output was not the expected JSON.
    #[error("malformed detector output: {0}")]
    Output(#[from] serde_json::Error),

    /// A returned detection violates its invariants.
    #[error("invalid detection: {0}")]
    Invalid(#[from] InvalidDetection),

    /// An internal error in the detector.
    #[error("detector error: {message}")]
    Internal {
        /// Description of the error.
        message: String,
    },
}

/// A source of detection results.
///
/// Implementations must be shareable across every scheduler task; the
/// same instance is called concurrently for different sources.
pub trait Detector: Send + Sync {
    /// Run inference for one source and return its detections, possibly
    /// none.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError`] if inference fails. The caller treats this
    /// as a skipped tick, not as a reason to stop polling the source.
    fn infer<'a>(&'a self, source_id: &'a str)
    -> BoxFuture<'a, Result<Vec<Detection>, DetectorError>>;
}

/// Placeholder detector that returns random fire/smoke detections.
///
/// 40% of ticks are empty; the rest carry one detection with a bounding
/// box in `0..=400` and a confidence in `[0.3, 0.99)` rounded to three
/// decimals.
#[derive(Debug)]
pub struct StubDetector {
    rng: Mutex<StdRng>,
}

impl StubDetector {
    /// Create a stub detector seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Create a deterministic stub detector.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn sample(&self) -> Vec<Detection> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if rng.random::<f64>() < STUB_EMPTY_PROBABILITY {
            return Vec::new();
        }

        let label = STUB_LABELS.choose(&mut *rng).copied().unwrap_or("fire");
        let bbox = [
            rng.random_range(0..=STUB_MAX_COORD),
            rng.random_range(0..=STUB_MAX_COORD),
            rng.random_range(0..=STUB_MAX_COORD),
            rng.random_range(0..=STUB_MAX_COORD),
        ];
        let confidence = (rng.random_range(0.3..0.99_f64) * 1000.0).round() / 1000.0;

        vec![Detection {
            label: label.to_owned(),
            confidence,
            bbox,
        }]
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for StubDetector {
    fn infer<'a>(
        &'a self,
        _source_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Detection>, DetectorError>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            Ok(self.sample())
        })
    }
}

/// JSON document the external program prints on stdout.
#[derive(Debug, serde::Deserialize)]
struct ProcessOutput {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Detector that shells out to an external inference program.
///
/// Each call runs `program <args...> --camera_id <source_id>` and expects
/// `{"detections": [{"label", "confidence", "bbox"}, ...]}` on stdout. The
/// child is killed if the call is dropped, so a scheduler timeout or
/// shutdown never leaks processes.
#[derive(Debug, Clone)]
pub struct ProcessDetector {
    program: String,
    args: Vec<String>,
}

impl ProcessDetector {
    /// Create a process detector for `program` with leading `args`.
    pub const fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    async fn run(&self, source_id: &str) -> Result<Vec<Detection>, DetectorError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--camera_id")
            .arg(source_id)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if stderr.len() > MAX_STDERR_LEN {
                let mut cut = MAX_STDERR_LEN;
                while !stderr.is_char_boundary(cut) {
                    cut = cut.saturating_sub(1);
                }
                stderr.truncate(cut);
            }
            return Err(DetectorError::Exit {
                code: output.status.code(),
                stderr: stderr.trim_end().to_owned(),
            });
        }

        let parsed: ProcessOutput = serde_json::from_slice(&output.stdout)?;
        for detection in &parsed.detections {
            detection.validate()?;
        }
        Ok(parsed.detections)
    }
}

impl Detector for ProcessDetector {
    fn infer<'a>(
        &'a self,
        source_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Detection>, DetectorError>> {
        Box::pin(self.run(source_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_detections_stay_in_range() {
        let detector = StubDetector::with_seed(7);
        let mut non_empty = 0_u32;

        for _ in 0..200 {
            let detections = detector.infer("cam1").await.unwrap();
            assert!(detections.len() <= 1);
            for d in &detections {
                non_empty = non_empty.saturating_add(1);
                assert!(STUB_LABELS.contains(&d.label.as_str()));
                assert!(d.validate().is_ok());
                assert!(d.confidence >= 0.3 && d.confidence <= 0.99);
                assert!(d.bbox.iter().all(|c| (0..=STUB_MAX_COORD).contains(c)));
            }
        }

        // Roughly 60% of ticks should carry a detection.
        assert!(non_empty > 60 && non_empty < 180, "non_empty = {non_empty}");
    }

    #[tokio::test]
    async fn stub_with_same_seed_is_deterministic() {
        let a = StubDetector::with_seed(42);
        let b = StubDetector::with_seed(42);
        for _ in 0..20 {
            assert_eq!(a.infer("cam1").await.unwrap(), b.infer("cam1").await.unwrap());
        }
    }

    #[cfg(unix)]
    fn sh(script: &str) -> ProcessDetector {
        // `sh -c script name --camera_id <id>` binds the id to `$2`.
        ProcessDetector::new(
            "sh".to_owned(),
            vec!["-c".to_owned(), script.to_owned(), "detector".to_owned()],
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_output_is_parsed() {
        let detector = sh(
            r#"printf '{"camera":"%s","detections":[{"label":"fire","confidence":0.9,"bbox":[1,2,3,4]}]}' "$2""#,
        );
        let detections = detector.infer("cam7").await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "fire");
        assert_eq!(detections[0].bbox, [1, 2, 3, 4]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_receives_camera_id() {
        let detector = sh(
            r#"if [ "$1" = "--camera_id" ] && [ "$2" = "cam7" ]; then echo '{"detections":[]}'; else exit 9; fi"#,
        );
        assert!(detector.infer("cam7").await.unwrap().is_empty());
        assert!(matches!(
            detector.infer("other").await,
            Err(DetectorError::Exit { code: Some(9), .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_failure_reports_stderr() {
        let detector = sh("echo 'model not found' >&2; exit 3");
        let err = detector.infer("cam1").await.unwrap_err();
        match err {
            DetectorError::Exit { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "model not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_garbage_output_is_a_fault() {
        let detector = sh("echo 'not json'");
        assert!(matches!(
            detector.infer("cam1").await,
            Err(DetectorError::Output(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_invalid_confidence_is_a_fault() {
        let detector =
            sh(r#"echo '{"detections":[{"label":"fire","confidence":4.0,"bbox":[0,0,1,1]}]}'"#);
        assert!(matches!(
            detector.infer("cam1").await,
            Err(DetectorError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let detector = ProcessDetector::new("/nonexistent/firewatch-detector".to_owned(), vec![]);
        assert!(matches!(
            detector.infer("cam1").await,
            Err(DetectorError::Spawn(_))
        ));
    }
}
