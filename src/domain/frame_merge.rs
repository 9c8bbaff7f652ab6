// Merging frames fetched from independent, possibly overlapping batches
use super::series::{Frame, ValueField};
use std::collections::BTreeMap;

/// Merge frames sharing a shape signature into one time-sorted frame without
/// duplicate timestamps. For a repeated instant the frame with the earliest
/// first timestamp wins; equal first timestamps keep input order.
pub fn merge_frames(frames: Vec<Frame>) -> Vec<Frame> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<Frame>> = BTreeMap::new();
    for frame in frames {
        let signature = frame.shape_signature();
        if !groups.contains_key(&signature) {
            order.push(signature.clone());
        }
        groups.entry(signature).or_default().push(frame);
    }

    order
        .into_iter()
        .filter_map(|signature| groups.remove(&signature))
        .map(merge_group)
        .collect()
}

fn merge_group(mut group: Vec<Frame>) -> Frame {
    if group.len() == 1 {
        return group.remove(0);
    }

    group.sort_by_key(|f| f.first_time().unwrap_or(i64::MAX));

    let mut rows: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for frame in &group {
        for (index, &time) in frame.times.iter().enumerate() {
            rows.entry(time).or_insert_with(|| frame.row(index));
        }
    }

    let template = &group[0];
    let times: Vec<i64> = rows.keys().copied().collect();
    let fields = template
        .fields
        .iter()
        .enumerate()
        .map(|(column, field)| ValueField {
            name: field.name.clone(),
            labels: field.labels.clone(),
            values: rows.values().map(|row| row[column]).collect(),
        })
        .collect();

    Frame {
        name: template.name.clone(),
        times,
        fields,
    }
}
