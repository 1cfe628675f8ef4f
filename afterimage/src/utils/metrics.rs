#[cfg(feature = "metrics")]
mod imp {
    use std::time::Instant;

    use log::trace;

    /// Logs how long it took to drop this guard.
    pub struct Metric {
        label: String,
        started_at: Instant,
    }

    impl Metric {
        pub fn new(label: impl AsRef<str>) -> Self {
            Self {
                label: label.as_ref().to_owned(),
                started_at: Instant::now(),
            }
        }
    }

    impl Drop for Metric {
        fn drop(&mut self) {
            let elapsed = self.started_at.elapsed();

            trace!(
                "metric: {} took {}",
                self.label,
                humantime::format_duration(elapsed),
            );
        }
    }
}

#[cfg(not(feature = "metrics"))]
mod imp {
    pub struct Metric;

    impl Metric {
        pub fn new(_: impl AsRef<str>) -> Self {
            Self
        }
    }
}

pub use self::imp::*;
