use indicatif::{ProgressBar, ProgressStyle};

/// Progress of one multipart transfer, counted in bytes
pub struct TransferProgress {
    progress_bar: ProgressBar,
}

impl TransferProgress {
    pub fn new(key: &str, total_bytes: u64, visible: bool) -> Self {
        let pb = if visible {
            ProgressBar::new(total_bytes)
        } else {
            ProgressBar::hidden()
        };
        pb.set_length(total_bytes);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_message(key.to_string());

        Self { progress_bar: pb }
    }

    pub fn advance(&self, bytes: u64) {
        self.progress_bar.inc(bytes);
    }

    pub fn position(&self) -> u64 {
        self.progress_bar.position()
    }

    pub fn finish_success(&self) {
        self.progress_bar.finish_and_clear();
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .abandon_with_message(format!("Upload failed: {}", error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_counts_bytes() {
        let progress = TransferProgress::new("big.bin", 100, false);
        progress.advance(60);
        progress.advance(40);
        assert_eq!(progress.position(), 100);
        progress.finish_success();
    }
}
