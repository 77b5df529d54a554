// ⏳ Progress - per-row progress bars for long loops
// indicatif draws to stderr and stays hidden when stderr is not a terminal

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

pub fn row_progress(len: usize, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message(message.to_string());
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_progress_counts() {
        let bar = row_progress(3, "rows");
        bar.inc(1);
        bar.inc(2);
        assert_eq!(bar.position(), 3);
        assert_eq!(bar.length(), Some(3));
        bar.finish_with_message("done");
    }
}
