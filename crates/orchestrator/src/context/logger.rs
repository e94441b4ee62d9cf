use deploy_core::{LogLevel, ProcessLogLine, ProgressMessageType};
use tracing::{debug, error, info, warn};

/// Progress line buffered during a tick, waiting to be written to the
/// progress message sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEntry {
    pub message_type: ProgressMessageType,
    pub text: String,
}

/// Step-scoped log buffer.
///
/// Everything logged here also goes to `tracing` right away; the buffered
/// copies are flushed by the step helper once the tick is over.
#[derive(Debug, Clone, Default)]
pub struct StepLogger {
    lines: Vec<ProcessLogLine>,
    progress: Vec<ProgressEntry>,
    polling_progress: Option<(usize, usize)>,
}

impl StepLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log line plus an info progress message.
    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.push(LogLevel::Info, ProgressMessageType::Info, message);
    }

    /// Log line only, never shown as progress.
    pub fn debug(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("{message}");
        self.lines.push(ProcessLogLine::new(LogLevel::Debug, message));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.push(LogLevel::Warn, ProgressMessageType::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.push(LogLevel::Error, ProgressMessageType::Error, message);
    }

    /// Report "X/Y finished" for a polling tick.
    pub fn report_progress(&mut self, finished: usize, total: usize) {
        self.info(format!("{finished}/{total} finished"));
        self.polling_progress = Some((finished, total));
    }

    fn push(&mut self, level: LogLevel, message_type: ProgressMessageType, message: String) {
        self.lines.push(ProcessLogLine::new(level, message.clone()));
        self.progress.push(ProgressEntry {
            message_type,
            text: message,
        });
    }

    pub fn pending_lines(&self) -> &[ProcessLogLine] {
        &self.lines
    }

    pub fn pending_progress(&self) -> &[ProgressEntry] {
        &self.progress
    }

    pub fn take_lines(&mut self) -> Vec<ProcessLogLine> {
        std::mem::take(&mut self.lines)
    }

    pub fn take_progress(&mut self) -> Vec<ProgressEntry> {
        std::mem::take(&mut self.progress)
    }

    pub fn take_polling_progress(&mut self) -> Option<(usize, usize)> {
        self.polling_progress.take()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.progress.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_not_progress() {
        let mut logger = StepLogger::new();
        logger.debug("guid stored");
        logger.info("Task started");

        assert_eq!(logger.pending_lines().len(), 2);
        assert_eq!(
            logger.pending_progress(),
            &[ProgressEntry {
                message_type: ProgressMessageType::Info,
                text: "Task started".to_string(),
            }]
        );
    }

    #[test]
    fn test_take_drains_buffers() {
        let mut logger = StepLogger::new();
        logger.error("boom");
        logger.report_progress(1, 3);

        assert_eq!(logger.take_progress().len(), 2);
        assert_eq!(logger.take_lines().len(), 2);
        assert_eq!(logger.take_polling_progress(), Some((1, 3)));
        assert!(logger.is_empty());
        assert_eq!(logger.take_polling_progress(), None);
    }
}
