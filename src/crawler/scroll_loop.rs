use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::TaskRunConfig;
use crate::crawler::pipeline::ItemPipeline;
use crate::domain::{Candidate, Identifier, TaskRun};
use crate::platform::PlatformKit;
use crate::scraper::{Outcome, PageDriver, StallCounter, Supervisor};
use crate::store::Ledger;

/// Phases of the scan, extract, scroll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Scanning,
    Extracting,
    Scrolling,
    Stalled,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetReached,
    FeedExhausted,
    Stalled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::BudgetReached => f.write_str("item budget reached"),
            StopReason::FeedExhausted => f.write_str("end of feed"),
            StopReason::Stalled => f.write_str("no new content"),
        }
    }
}

/// Transient state of one crawl session; never persisted.
#[derive(Debug)]
pub struct SessionState {
    pub last_viewport_offset: f64,
    pub no_new_content_streak: StallCounter,
    pub processed_this_pass: usize,
    /// Every identifier tried this session, whether it succeeded or not
    pub attempted: HashSet<Identifier>,
    pub result_page: u32,
}

impl SessionState {
    fn new(stall_limit: u32) -> Self {
        Self {
            last_viewport_offset: 0.0,
            no_new_content_streak: StallCounter::new(stall_limit),
            processed_this_pass: 0,
            attempted: HashSet::new(),
            result_page: 1,
        }
    }
}

/// Totals of one session
#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    pub extracted: usize,
    pub failed: usize,
    pub known: usize,
    pub scans: u32,
    pub scrolls: u32,
    pub stop: StopReason,
}

impl LoopReport {
    pub fn final_state(&self) -> LoopState {
        match self.stop {
            StopReason::Stalled => LoopState::Stalled,
            _ => LoopState::Done,
        }
    }
}

/// Candidates of one scan, split by what is already known about them
#[derive(Debug, Default)]
struct Partition {
    new: Vec<(Candidate, Identifier)>,
    attempted: usize,
    known: usize,
    unidentified: usize,
}

fn partition(
    candidates: Vec<Candidate>,
    session: &SessionState,
    ledger: &Ledger,
) -> Partition {
    let mut result = Partition::default();
    let mut in_scan = HashSet::new();

    for candidate in candidates {
        let Some(identifier) = candidate.identifier() else {
            result.unidentified += 1;
            continue;
        };
        if session.attempted.contains(&identifier) {
            result.attempted += 1;
        } else if ledger.contains(&identifier) {
            result.known += 1;
        } else if in_scan.insert(identifier.clone()) {
            result.new.push((candidate, identifier));
        }
    }

    result
}

/// Drives a feed until the budget is spent, the feed ends, or it stops
/// yielding new items.
pub struct ScrollLoop<'a> {
    task: &'a TaskRun,
    kit: &'a PlatformKit,
    pipeline: ItemPipeline<'a>,
    supervisor: Supervisor,
    settle_delay: Duration,
    state: LoopState,
    session: SessionState,
}

impl<'a> ScrollLoop<'a> {
    pub fn new(run: &'a TaskRunConfig, kit: &'a PlatformKit, pipeline: ItemPipeline<'a>) -> Self {
        Self {
            task: &run.task,
            kit,
            pipeline,
            supervisor: run.supervisor(),
            settle_delay: run.crawl.settle_delay(),
            state: LoopState::Scanning,
            session: SessionState::new(run.crawl.stall_limit),
        }
    }

    pub async fn run(mut self, page: &dyn PageDriver, ledger: &mut Ledger) -> LoopReport {
        let budget = self.task.max_items;
        let mut processed = 0;
        let mut failed = 0;
        let mut known = 0;
        let mut scans = 0;
        let mut scrolls = 0;

        let stop = loop {
            if processed >= budget {
                break StopReason::BudgetReached;
            }

            self.transition(LoopState::Scanning);
            scans += 1;
            let candidates = match self
                .supervisor
                .run("scan feed", || self.kit.extractor.scan(page))
                .await
            {
                Outcome::Done(candidates) => candidates,
                Outcome::Skipped(e) | Outcome::Exhausted(e) => {
                    warn!("Scan failed, treating as empty: {}", e);
                    Vec::new()
                }
            };

            let total = candidates.len();
            let split = partition(candidates, &self.session, ledger);
            known += split.known;
            info!(
                "Scan {}: {} candidates, {} new, {} already saved, {} tried this run",
                scans,
                total,
                split.new.len(),
                split.known,
                split.attempted
            );
            if split.unidentified > 0 {
                debug!("{} candidates without url or title", split.unidentified);
            }

            if split.new.is_empty() {
                let streak = self.session.no_new_content_streak.miss();
                debug!(
                    "No new candidates ({}/{})",
                    streak,
                    self.session.no_new_content_streak.limit()
                );
            } else {
                self.session.no_new_content_streak.reset();
                self.transition(LoopState::Extracting);
                self.session.processed_this_pass = 0;

                for (candidate, identifier) in split.new {
                    if processed >= budget {
                        break;
                    }
                    self.session.attempted.insert(identifier.clone());

                    match self.pipeline.process(page, &candidate, &identifier).await {
                        Ok(persisted) => {
                            if let Err(e) = ledger.add(identifier.clone(), &persisted.folder) {
                                warn!("Failed to record {} in ledger: {}", identifier, e);
                            }
                            processed += 1;
                            self.session.processed_this_pass += 1;
                            info!(
                                "[{}/{}] Saved '{}' to {}",
                                processed,
                                budget,
                                persisted.record.display_title(),
                                persisted.folder.display()
                            );
                        }
                        Err(e) => {
                            failed += 1;
                            warn!("Skipping '{}' ({}): {}", candidate.display_title(), identifier, e);
                        }
                    }
                }
            }

            if processed >= budget {
                break StopReason::BudgetReached;
            }

            if self.end_of_feed(page).await {
                let current = self.session.result_page;
                match self.kit.navigator.next_page(page, self.task, current).await {
                    Ok(true) => {
                        self.session.result_page += 1;
                        self.session.last_viewport_offset = 0.0;
                        self.session.no_new_content_streak.reset();
                        info!("Continuing on result page {}", self.session.result_page);
                        continue;
                    }
                    Ok(false) => break StopReason::FeedExhausted,
                    Err(e) => {
                        warn!("Failed to open result page {}: {}", current + 1, e);
                        break StopReason::FeedExhausted;
                    }
                }
            }

            if self.session.no_new_content_streak.is_stalled() {
                break StopReason::Stalled;
            }

            self.transition(LoopState::Scrolling);
            scrolls += 1;
            match self
                .supervisor
                .run("scroll feed", || self.kit.scroller.advance(page))
                .await
            {
                Outcome::Done(offset) => {
                    if offset <= self.session.last_viewport_offset {
                        debug!("Scroll position unchanged at {}", offset);
                    }
                    self.session.last_viewport_offset = offset;
                }
                Outcome::Skipped(e) | Outcome::Exhausted(e) => {
                    warn!("Scroll failed: {}", e);
                }
            }
            if !self.settle_delay.is_zero() {
                tokio::time::sleep(self.settle_delay).await;
            }
        };

        let final_state = match stop {
            StopReason::Stalled => LoopState::Stalled,
            _ => LoopState::Done,
        };
        self.transition(final_state);
        info!(
            "Stopped after {} scans: {} ({} saved, {} failed)",
            scans, stop, processed, failed
        );

        LoopReport {
            extracted: processed,
            failed,
            known,
            scans,
            scrolls,
            stop,
        }
    }

    async fn end_of_feed(&self, page: &dyn PageDriver) -> bool {
        match self.kit.extractor.end_of_feed(page).await {
            Ok(end) => end,
            Err(e) => {
                debug!("End-of-feed check failed: {}", e);
                false
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::testing::{
        candidates, fetcher, kit, kit_paged, run_config, FakePage, FeedState,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn run_feed(
        dir: &std::path::Path,
        feed: Arc<FeedState>,
        max_items: usize,
    ) -> (LoopReport, Ledger) {
        run_kit(dir, kit(feed), max_items).await
    }

    async fn run_kit(dir: &std::path::Path, kit: PlatformKit, max_items: usize) -> (LoopReport, Ledger) {
        let run = run_config(dir, max_items, false);
        std::fs::create_dir_all(run.task_dir()).unwrap();
        let fetcher = fetcher();
        let pipeline = ItemPipeline::new(&run, kit.extractor.as_ref(), &fetcher, None);
        let mut ledger = Ledger::load(run.task_dir());
        let report = ScrollLoop::new(&run, &kit, pipeline)
            .run(&FakePage::default(), &mut ledger)
            .await;
        (report, ledger)
    }

    #[tokio::test]
    async fn test_budget_stops_before_third_extraction() {
        let dir = TempDir::new().unwrap();
        // 5 distinct items over two passes
        let feed = FeedState::new(vec![candidates(1..=3), candidates(1..=5)]);
        let (report, ledger) = run_feed(dir.path(), feed.clone(), 2).await;

        assert_eq!(report.extracted, 2);
        assert_eq!(report.stop, StopReason::BudgetReached);
        assert_eq!(ledger.len(), 2);
        assert_eq!(feed.extracted(), vec!["1", "2"]);

        let task_dir = dir.path().join("task");
        assert!(task_dir.join("note_1/content.json").exists());
        assert!(task_dir.join("note_2/content.json").exists());
        assert!(!task_dir.join("note_3").exists());
    }

    #[tokio::test]
    async fn test_rerun_adds_nothing_when_feed_unchanged() {
        let dir = TempDir::new().unwrap();
        let passes = || vec![candidates(1..=2), candidates(1..=3)];

        let (first, ledger) = run_feed(dir.path(), FeedState::new(passes()), 10).await;
        assert_eq!(first.extracted, 3);
        assert_eq!(ledger.len(), 3);

        let feed = FeedState::new(passes());
        let (second, ledger) = run_feed(dir.path(), feed.clone(), 10).await;
        assert_eq!(second.extracted, 0);
        assert_eq!(ledger.len(), 3);
        assert!(feed.extracted().is_empty());
        assert!(!dir.path().join("task/note_4").exists());
    }

    #[tokio::test]
    async fn test_stalls_within_limit_after_feed_dries_up() {
        let dir = TempDir::new().unwrap();
        // New items for two scroll passes, then the same items forever
        let feed = FeedState::new(vec![candidates(1..=2), candidates(1..=4)]);
        let (report, _) = run_feed(dir.path(), feed.clone(), 100).await;

        assert_eq!(report.stop, StopReason::Stalled);
        assert_eq!(report.final_state(), LoopState::Stalled);
        assert_eq!(report.extracted, 4);
        // run_config uses a stall limit of 3
        assert!(report.scrolls <= 1 + 3, "scrolled {} times", report.scrolls);
    }

    #[tokio::test]
    async fn test_end_marker_finishes_feed() {
        let dir = TempDir::new().unwrap();
        let feed = FeedState::with_end(vec![candidates(1..=2), candidates(1..=3)], 1);
        let (report, _) = run_feed(dir.path(), feed, 100).await;

        assert_eq!(report.stop, StopReason::FeedExhausted);
        assert_eq!(report.extracted, 3);
        assert_eq!(report.scrolls, 1);
    }

    #[tokio::test]
    async fn test_failed_item_is_not_retried_and_loop_continues() {
        let dir = TempDir::new().unwrap();
        let feed = FeedState::new(vec![candidates(1..=3)]).failing(&["2"]);
        let (report, ledger) = run_feed(dir.path(), feed.clone(), 100).await;

        assert_eq!(report.extracted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(ledger.len(), 2);
        assert_eq!(feed.extracted(), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_duplicates_within_a_scan_are_processed_once() {
        let dir = TempDir::new().unwrap();
        let mut pass = candidates(1..=2);
        let mut dup = pass[0].clone();
        dup.reference = "99".into();
        pass.push(dup);
        let feed = FeedState::new(vec![pass]);
        let (report, _) = run_feed(dir.path(), feed.clone(), 100).await;

        assert_eq!(report.extracted, 2);
        assert_eq!(feed.extracted(), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_end_marker_turns_to_next_result_page() {
        let dir = TempDir::new().unwrap();
        let feed = FeedState::paged(
            vec![
                vec![candidates(1..=2), candidates(1..=3)],
                vec![candidates(4..=5), candidates(4..=6)],
            ],
            1,
        );
        let (report, ledger) = run_kit(dir.path(), kit_paged(feed.clone()), 100).await;

        assert_eq!(feed.extracted(), vec!["1", "2", "3", "4", "5", "6"]);
        assert_eq!(ledger.len(), 6);
        assert_eq!(feed.page(), 1);
        assert_eq!(report.stop, StopReason::FeedExhausted);
        assert_eq!(report.final_state(), LoopState::Done);
        // one scroll per page, none after the last page ended
        assert_eq!(report.scrolls, 2);
        assert_eq!(report.scans, 4);
    }

    #[tokio::test]
    async fn test_pages_without_new_items_still_finish() {
        let dir = TempDir::new().unwrap();
        // Every page repeats the same items and shows its end marker at once
        let feed = FeedState::paged(vec![vec![candidates(1..=2)]; 3], 0);
        let (report, _) = run_kit(dir.path(), kit_paged(feed.clone()), 100).await;

        assert_eq!(report.stop, StopReason::FeedExhausted);
        assert_eq!(report.extracted, 2);
        assert_eq!(feed.page(), 2);
        assert_eq!(report.scans, 3);
        assert_eq!(report.scrolls, 0);
    }
}
