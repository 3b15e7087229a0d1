use crate::rate::Percent;
use crate::reconcile::ProcessEntry;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Metric {
    #[default]
    Cpu,
    Memory,
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum ColorBand {
    Low,
    Medium,
    High,
}

// both indices are into the ranked table, not the visible page.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Selection {
    index: usize,
    scroll: usize,
}

impl Metric {
    pub fn next(self) -> Self {
        match self {
            Self::Cpu => Self::Memory,
            Self::Memory => Self::Cpu,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "mem",
        }
    }
}

impl ColorBand {
    const MEDIUM: f64 = 50.0;
    const HIGH: f64 = 80.0;

    // [0, 50) low, [50, 80] medium, above that high.
    pub fn of(percent: Percent) -> Self {
        let p = percent.get();
        if p < Self::MEDIUM {
            Self::Low
        } else if p <= Self::HIGH {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl Selection {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn up(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    // may run past the end of the table until the next clamp.
    pub fn down(&mut self) {
        self.index = self.index.saturating_add(1);
    }

    pub fn page_up(&mut self, page: usize) {
        self.index = self.index.saturating_sub(page.max(1));
    }

    pub fn page_down(&mut self, page: usize) {
        self.index = self.index.saturating_add(page.max(1));
    }

    pub fn top(&mut self) {
        self.index = 0;
    }

    pub fn bottom(&mut self) {
        self.index = usize::MAX;
    }

    pub fn select(&mut self, index: usize) {
        self.index = index;
    }

    pub fn clamp(&mut self, len: usize) {
        self.index = self.index.min(len.saturating_sub(1));
        self.scroll = self.scroll.min(len.saturating_sub(1));
    }

    /// Scrolls just enough to keep the selected row within a page of `visible_rows`.
    pub fn align(&mut self, len: usize, visible_rows: usize) {
        let page = visible_rows.max(1);
        if self.index < self.scroll {
            self.scroll = self.index;
        } else if self.index >= self.scroll + page {
            self.scroll = self.index + 1 - page;
        }
        self.scroll = clamp_scroll(self.scroll, len, page);
    }
}

// highest first; ties go to the lower pid.
pub fn rank(mut entries: Vec<ProcessEntry>, metric: Metric) -> Vec<ProcessEntry> {
    entries.sort_by(|a, b| {
        match metric {
            Metric::Cpu => b.cpu.get().total_cmp(&a.cpu.get()),
            Metric::Memory => b.sample.resident_bytes.cmp(&a.sample.resident_bytes),
        }
        .then_with(|| a.sample.pid.cmp(&b.sample.pid))
    });
    entries
}

pub fn paginate<T>(ranked: &[T], scroll: usize, visible_rows: usize) -> &[T] {
    let start = clamp_scroll(scroll, ranked.len(), visible_rows);
    let end = (start + visible_rows).min(ranked.len());
    &ranked[start..end]
}

pub fn clamp_scroll(scroll: usize, len: usize, visible_rows: usize) -> usize {
    scroll.min(len.saturating_sub(visible_rows))
}

pub fn bar(percent: Percent, width: usize) -> String {
    let fill = ((percent.get() / 100.0) * width as f64) as usize;
    let mut s = String::with_capacity(width * 3);
    for i in 0..width {
        s.push(if i < fill { '█' } else { '·' });
    }
    s
}

pub fn trim_text(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let out: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{out}..")
    } else {
        out
    }
}

pub fn human_bytes(b: u64) -> String {
    let kib = 1024.0;
    let mib = kib * 1024.0;
    let gib = mib * 1024.0;
    let bf = b as f64;
    if bf >= gib {
        format!("{:.1}G", bf / gib)
    } else if bf >= mib {
        format!("{:.0}M", bf / mib)
    } else if bf >= kib {
        format!("{:.0}K", bf / kib)
    } else {
        format!("{}B", b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::ProcessSample;
    use crate::counters::mock::process;

    fn entry(pid: u32, cpu: f64) -> ProcessEntry {
        ProcessEntry {
            sample: process(pid, 0),
            cpu: Percent::new(cpu),
        }
    }

    fn pids(entries: &[ProcessEntry]) -> Vec<u32> {
        entries.iter().map(|e| e.sample.pid).collect()
    }

    #[test]
    fn rank_by_cpu_descending() {
        let ranked = rank(
            vec![entry(1, 5.0), entry(2, 50.0), entry(3, 20.0)],
            Metric::Cpu,
        );
        assert_eq!(pids(&ranked), vec![2, 3, 1]);
    }

    #[test]
    fn rank_ties_break_on_pid() {
        let ranked = rank(
            vec![entry(30, 10.0), entry(4, 10.0), entry(17, 10.0), entry(9, 90.0)],
            Metric::Cpu,
        );
        assert_eq!(pids(&ranked), vec![9, 4, 17, 30]);
        assert_eq!(ranked.len(), 4);
    }

    #[test]
    fn rank_by_memory() {
        let with_rss = |pid, resident_bytes| ProcessEntry {
            sample: ProcessSample {
                resident_bytes,
                ..process(pid, 0)
            },
            cpu: Percent::MAX,
        };
        let ranked = rank(
            vec![with_rss(1, 10), with_rss(2, 300), with_rss(3, 300)],
            Metric::Memory,
        );
        assert_eq!(pids(&ranked), vec![2, 3, 1]);
    }

    #[test]
    fn rank_of_nothing() {
        assert!(rank(vec![], Metric::Cpu).is_empty());
    }

    #[test]
    fn paginate_windows() {
        let rows = (0..10).collect::<Vec<_>>();
        assert_eq!(paginate(&rows, 0, 3), &[0, 1, 2]);
        assert_eq!(paginate(&rows, 4, 3), &[4, 5, 6]);
        // scrolled past the end, the last full page is shown.
        assert_eq!(paginate(&rows, 9, 3), &[7, 8, 9]);
        assert_eq!(paginate(&rows, 0, 20), rows.as_slice());
        assert!(paginate::<u8>(&[], 5, 3).is_empty());
    }

    #[test]
    fn color_band_boundaries() {
        assert_eq!(ColorBand::of(Percent::new(49.9)), ColorBand::Low);
        assert_eq!(ColorBand::of(Percent::new(50.0)), ColorBand::Medium);
        assert_eq!(ColorBand::of(Percent::new(80.0)), ColorBand::Medium);
        assert_eq!(ColorBand::of(Percent::new(80.1)), ColorBand::High);
        assert_eq!(ColorBand::of(Percent::ZERO), ColorBand::Low);
        assert_eq!(ColorBand::of(Percent::MAX), ColorBand::High);
    }

    #[test]
    fn selection_clamps_to_table() {
        let mut selection = Selection::default();
        for _ in 0..5 {
            selection.down();
            selection.clamp(3);
        }
        assert_eq!(selection.index(), 2);

        selection.up();
        selection.up();
        selection.up();
        assert_eq!(selection.index(), 0);
    }

    #[test]
    fn selection_on_empty_table() {
        let mut selection = Selection::default();
        selection.bottom();
        selection.clamp(0);
        selection.align(0, 10);
        assert_eq!(selection, Selection::default());
    }

    #[test]
    fn selection_scrolls_with_index() {
        let mut selection = Selection::default();
        selection.page_down(12);
        selection.clamp(100);
        selection.align(100, 10);
        assert_eq!((selection.index(), selection.scroll()), (12, 3));

        selection.bottom();
        selection.clamp(100);
        selection.align(100, 10);
        assert_eq!((selection.index(), selection.scroll()), (99, 90));

        selection.top();
        selection.align(100, 10);
        assert_eq!((selection.index(), selection.scroll()), (0, 0));
    }

    #[test]
    fn selection_scroll_shrinks_with_table() {
        let mut selection = Selection::default();
        selection.bottom();
        selection.clamp(50);
        selection.align(50, 10);
        assert_eq!(selection.scroll(), 40);

        selection.clamp(12);
        selection.align(12, 10);
        assert_eq!((selection.index(), selection.scroll()), (11, 2));
    }

    #[test]
    fn bar_fills_by_floor() {
        assert_eq!(bar(Percent::new(50.0), 4), "██··");
        assert_eq!(bar(Percent::new(99.0), 4), "███·");
        assert_eq!(bar(Percent::MAX, 3), "███");
        assert_eq!(bar(Percent::ZERO, 2), "··");
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(human_bytes(512), "512B");
        assert_eq!(human_bytes(8 * 1024), "8K");
        assert_eq!(human_bytes(300 * 1024 * 1024), "300M");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024 / 2), "1.5G");
    }

    #[test]
    fn long_names_are_trimmed() {
        assert_eq!(trim_text("systemd", 18), "systemd");
        assert_eq!(trim_text("gnome-shell-calendar-server", 5), "gnome..");
    }
}
