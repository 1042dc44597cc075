use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glam::Vec2;
use grammar_growth::prelude::*;
use grammar_growth_examples::{
    init_tracing, render_tree_to_png, tree_grammar, ReachCost, RenderConfig, Segment, TreeParams,
};

/// Frame time the search shares with the rest of a fictional game loop.
const FRAME: Duration = Duration::from_millis(16);

fn main() -> anyhow::Result<()> {
    init_tracing();

    let target = Vec2::new(60.0, 240.0);
    let grammar = tree_grammar(TreeParams::default())?;
    let generator = Generator::new(grammar, Segment::root(Vec2::ZERO));

    // Wide early search, narrow late search.
    let config = SosmcConfig::new(20)
        .with_sample_count(Schedule::Linear {
            start: 300.0,
            end: 20.0,
        })
        .with_heuristic_scale(Schedule::Linear {
            start: 2.0,
            end: 0.5,
        })
        .with_burst_budget(Duration::from_millis(4));

    let sink = FilterSink::new(
        FnSink::new(|event: GrowthEvent| match event {
            GrowthEvent::Resampled {
                generation,
                from,
                to,
                distinct_parents,
                ..
            } => tracing::info!(generation, from, to, distinct_parents, "resampled"),
            GrowthEvent::Warning { context, message } => {
                tracing::warn!(context = %context, "{message}")
            }
            _ => {}
        }),
        [GrowthEventKind::Resampled, GrowthEventKind::Warning],
    );

    let run = generator
        .sosmc_run("trunk", config.clone(), ReachCost::new(target), 99)?
        .with_event_sink(sink);
    let mut task = Task::new(run, config.burst_budget);

    let finished = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&finished);
    task.then(move |outcome: &GrowthOutcome<Segment>, stats: &TaskStats| {
        if let Ok(mut slot) = slot.lock() {
            *slot = Some((outcome.structure.clone(), stats.bursts));
        }
    });

    let mut frames = 0usize;
    loop {
        let frame_start = Instant::now();
        let burst = task.run_burst()?;
        frames += 1;
        if frames % 10 == 0 {
            tracing::info!(
                frame = frames,
                progress = task.computation().progress(),
                stage = ?task.computation().stage(),
                "still growing"
            );
        }
        if burst != Burst::Pending {
            break;
        }
        if let Some(rest) = FRAME.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    let stats = task.stats();
    tracing::info!(
        frames,
        bursts = stats.bursts,
        steps = stats.steps,
        busy_ms = stats.busy.as_secs_f64() * 1000.0,
        elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0,
        "search finished"
    );

    let Some((tree, bursts)) = finished.lock().ok().and_then(|mut s| s.take()) else {
        anyhow::bail!("search ended without a result");
    };
    tracing::info!(nodes = tree.len(), bursts, "completion callback fired");

    render_tree_to_png(
        &tree,
        &[],
        Some(target),
        &RenderConfig::default(),
        "tree-sosmc-funnel-budgeted.png",
    )
}
