use std::collections::HashMap;
use std::io::{self, Write};

use deeptime_core::{Clustered, FrameLayout, LayoutState};

fn state_label(state: LayoutState) -> &'static str {
    match state {
        LayoutState::Idle => "idle",
        LayoutState::Computing => "computing",
        LayoutState::Applied => "applied",
        LayoutState::Failed => "fallback",
    }
}

/// Plain-text summary of a frame: lanes, clusters, labels left to right,
/// then the axis ticks.
pub fn write_report(
    out: &mut impl Write,
    frame: &FrameLayout,
    total_events: usize,
    state: LayoutState,
) -> io::Result<()> {
    writeln!(
        out,
        "revision {}  lanes {}  layout {}",
        frame.revision,
        frame.lanes.lane_count(),
        state_label(state)
    )?;
    writeln!(out, "visible {} of {} events", frame.laid_out.len(), total_events)?;

    if frame.is_clustered() {
        let merged = frame
            .clusters
            .iter()
            .filter(|item| matches!(item, Clustered::Cluster(_)))
            .count();
        let largest = frame.clusters.iter().map(Clustered::count).max().unwrap_or(0);
        writeln!(
            out,
            "clusters {} ({} merged, largest {})  expansion {:.2}",
            frame.clusters.len(),
            merged,
            largest,
            frame.expansion_factor
        )?;
    } else {
        writeln!(out, "clusters none  expansion {:.2}", frame.expansion_factor)?;
    }

    let text: HashMap<&str, &str> = frame
        .laid_out
        .iter()
        .filter_map(|item| Some((item.event.id.as_str(), item.event.label.as_deref()?)))
        .collect();
    let mut labels: Vec<_> = frame.labels.iter().collect();
    labels.sort_by(|(a_id, a), (b_id, b)| {
        a.x.total_cmp(&b.x)
            .then(a.y.total_cmp(&b.y))
            .then_with(|| a_id.cmp(b_id))
    });
    writeln!(out, "labels {}", labels.len())?;
    for (id, rect) in labels {
        let label = text.get(id.as_str()).copied().unwrap_or_default();
        writeln!(out, "  {:>8.1} {:>6.1}  {id}  {label}", rect.x, rect.y)?;
    }

    writeln!(out, "ticks {}", frame.ticks.len())?;
    for tick in &frame.ticks {
        writeln!(out, "  {:>8.1}  {}", tick.x, tick.label)?;
    }
    Ok(())
}
