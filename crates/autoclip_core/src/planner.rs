//! Timeline planning: weighted blocks, then memory-bounded render chunks.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// Longest chunk rendered in one piece. Each chunk is encoded and dropped
/// independently, so this caps peak memory per worker.
pub const MAX_CHUNK_DURATION: TimeUs = TimeUs(15_000_000);

/// Blocks and chunks for one narration track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelinePlan {
    pub total_us: TimeUs,
    pub transition: Transition,
    pub blocks: Vec<TimelineBlock>,
    pub chunks: Vec<RenderChunk>,
}

impl TimelinePlan {
    pub fn new(total: TimeUs, folders: &[FolderSpec], transition: Transition) -> Self {
        let blocks = plan_blocks(total, folders);
        let chunks = plan_chunks(&blocks, transition, MAX_CHUNK_DURATION);
        Self {
            total_us: total,
            transition,
            blocks,
            chunks,
        }
    }
}

/// Split `total` into one contiguous block per folder, proportional to weight.
///
/// Boundaries come from the cumulative weight so rounding never accumulates.
/// A zero total weight yields zero-length blocks except for the last one,
/// which is always stretched to cover `total`; callers reject that
/// configuration before planning.
pub fn plan_blocks(total: TimeUs, folders: &[FolderSpec]) -> Vec<TimelineBlock> {
    let total_weight: f64 = folders.iter().map(|f| f.weight.max(0.0)).sum();

    let mut blocks: Vec<TimelineBlock> = Vec::with_capacity(folders.len());
    let mut cumulative = 0.0;
    let mut start = TimeUs::ZERO;

    for (index, spec) in folders.iter().enumerate() {
        cumulative += spec.weight.max(0.0);
        let end = if total_weight > 0.0 {
            total.scale(cumulative / total_weight).max(start)
        } else {
            start
        };

        blocks.push(TimelineBlock {
            index,
            folder: spec.folder.clone(),
            speed: spec.speed,
            random_cut: spec.random_cut(),
            start_us: start,
            end_us: end,
        });
        start = end;
    }

    if let Some(last) = blocks.last_mut() {
        last.end_us = last.end_us.max(total);
    }

    blocks
}

/// Slice each block into chunks no longer than `max_chunk`.
///
/// Transition flags only mark boundaries between non-empty blocks. Under
/// crossfade those boundary chunks carry extra head/tail material so the
/// compositor can overlap neighbouring scenes.
pub fn plan_chunks(
    blocks: &[TimelineBlock],
    transition: Transition,
    max_chunk: TimeUs,
) -> Vec<RenderChunk> {
    let max_chunk = max_chunk.max(TimeUs(1));
    let pad = if transition.is_crossfade() {
        transition.duration_us()
    } else {
        TimeUs::ZERO
    };
    let non_empty: Vec<bool> = blocks.iter().map(|b| b.span_us() > TimeUs::ZERO).collect();

    let mut chunks = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        if !non_empty[i] {
            continue;
        }
        let has_prev = non_empty[..i].iter().any(|&n| n);
        let has_next = non_empty[i + 1..].iter().any(|&n| n);

        let mut cursor = block.start_us;
        while cursor < block.end_us {
            let next = (cursor + max_chunk).min(block.end_us);
            let is_block_start = cursor == block.start_us;
            let is_block_end = next == block.end_us;
            let transition_in = is_block_start && has_prev;
            let transition_out = is_block_end && has_next;

            chunks.push(RenderChunk {
                index: chunks.len(),
                block_index: block.index,
                total_blocks: blocks.len(),
                folder: block.folder.clone(),
                speed: block.speed,
                random_cut: block.random_cut,
                start_us: cursor,
                end_us: next,
                duration_us: next - cursor,
                is_block_start,
                is_block_end,
                transition_in,
                transition_out,
                pad_head_us: if transition_in { pad } else { TimeUs::ZERO },
                pad_tail_us: if transition_out { pad } else { TimeUs::ZERO },
            });
            cursor = next;
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    fn folders(weights: &[f64]) -> Vec<FolderSpec> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| FolderSpec::new(format!("folder{i}"), *w))
            .collect()
    }

    #[test]
    fn two_equal_folders_split_evenly() {
        let blocks = plan_blocks(secs(100.0), &folders(&[50.0, 50.0]));
        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].start_us, blocks[0].end_us), (secs(0.0), secs(50.0)));
        assert_eq!((blocks[1].start_us, blocks[1].end_us), (secs(50.0), secs(100.0)));

        let chunks = plan_chunks(&blocks, Transition::none(), MAX_CHUNK_DURATION);
        let durations: Vec<f64> = chunks.iter().map(|c| c.duration_us.as_seconds()).collect();
        assert_eq!(durations, vec![15.0, 15.0, 15.0, 5.0, 15.0, 15.0, 15.0, 5.0]);
        assert_eq!(chunks.iter().filter(|c| c.block_index == 0).count(), 4);
        assert_eq!(chunks.iter().filter(|c| c.block_index == 1).count(), 4);
        assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn blocks_are_contiguous_and_cover_total() {
        let cases: &[(&[f64], f64)] = &[
            (&[1.0], 37.3),
            (&[1.0, 2.0, 3.0], 61.7),
            (&[0.3, 0.3, 0.3], 10.0),
            (&[7.0, 0.0, 13.0, 1.0], 123.456),
            (&[50.0, 25.0, 25.0], 0.9),
        ];
        for (weights, total) in cases {
            let total = secs(*total);
            let blocks = plan_blocks(total, &folders(weights));
            assert_eq!(blocks[0].start_us, TimeUs::ZERO);
            for pair in blocks.windows(2) {
                assert_eq!(pair[0].end_us, pair[1].start_us);
            }
            for b in &blocks {
                assert!(b.span_us() >= TimeUs::ZERO);
            }
            let sum: TimeUs = blocks.iter().map(|b| b.span_us()).sum();
            assert!((sum.as_seconds() - total.as_seconds()).abs() <= 1e-3);
            assert_eq!(blocks.last().unwrap().end_us, total);
        }
    }

    #[test]
    fn chunks_partition_each_block() {
        let blocks = plan_blocks(secs(97.25), &folders(&[3.0, 1.0, 2.0]));
        let chunks = plan_chunks(&blocks, Transition::crossfade(0.5), MAX_CHUNK_DURATION);

        for block in &blocks {
            let mine: Vec<&RenderChunk> =
                chunks.iter().filter(|c| c.block_index == block.index).collect();
            assert_eq!(mine.first().unwrap().start_us, block.start_us);
            assert_eq!(mine.last().unwrap().end_us, block.end_us);
            for pair in mine.windows(2) {
                assert_eq!(pair[0].end_us, pair[1].start_us);
            }
            for c in &mine {
                assert!(c.duration_us <= MAX_CHUNK_DURATION);
                assert_eq!(c.duration_us, c.end_us - c.start_us);
            }
            assert!(mine[0].is_block_start);
            assert!(mine.last().unwrap().is_block_end);
            assert_eq!(mine.iter().filter(|c| c.is_block_start).count(), 1);
            assert_eq!(mine.iter().filter(|c| c.is_block_end).count(), 1);
        }
    }

    #[test]
    fn crossfade_pads_only_inner_boundaries() {
        let blocks = plan_blocks(secs(60.0), &folders(&[1.0, 1.0, 1.0]));
        let chunks = plan_chunks(&blocks, Transition::crossfade(0.75), MAX_CHUNK_DURATION);
        let pad = secs(0.75);

        for pair in chunks.windows(2) {
            if pair[0].block_index != pair[1].block_index {
                assert_eq!(pair[0].pad_tail_us, pad);
                assert_eq!(pair[1].pad_head_us, pad);
            }
        }
        assert_eq!(chunks.first().unwrap().pad_head_us, TimeUs::ZERO);
        assert_eq!(chunks.last().unwrap().pad_tail_us, TimeUs::ZERO);
        for c in &chunks {
            if !c.is_block_start {
                assert_eq!(c.pad_head_us, TimeUs::ZERO);
            }
            if !c.is_block_end {
                assert_eq!(c.pad_tail_us, TimeUs::ZERO);
            }
        }
    }

    #[test]
    fn no_transition_means_no_pads() {
        for transition in [Transition::none(), Transition::fade_to_black(1.0)] {
            let blocks = plan_blocks(secs(80.0), &folders(&[1.0, 2.0, 1.0]));
            let chunks = plan_chunks(&blocks, transition, MAX_CHUNK_DURATION);
            assert!(chunks
                .iter()
                .all(|c| c.pad_head_us.is_zero() && c.pad_tail_us.is_zero()));
        }
    }

    #[test]
    fn fade_flags_mark_block_boundaries() {
        let blocks = plan_blocks(secs(40.0), &folders(&[1.0, 1.0]));
        let chunks = plan_chunks(&blocks, Transition::fade_to_black(1.0), MAX_CHUNK_DURATION);
        let outs: Vec<usize> = chunks.iter().filter(|c| c.transition_out).map(|c| c.index).collect();
        let ins: Vec<usize> = chunks.iter().filter(|c| c.transition_in).map(|c| c.index).collect();
        // 20s blocks: [15, 5] [15, 5]
        assert_eq!(outs, vec![1]);
        assert_eq!(ins, vec![2]);
    }

    #[test]
    fn empty_blocks_do_not_get_transitions() {
        let blocks = plan_blocks(secs(30.0), &folders(&[1.0, 1.0, 0.0]));
        assert_eq!(blocks[2].span_us(), TimeUs::ZERO);
        let chunks = plan_chunks(&blocks, Transition::crossfade(0.5), MAX_CHUNK_DURATION);
        assert!(chunks.iter().all(|c| c.block_index != 2));
        let last = chunks.last().unwrap();
        assert_eq!(last.block_index, 1);
        assert!(!last.transition_out);
        assert_eq!(last.pad_tail_us, TimeUs::ZERO);
    }

    #[test]
    fn zero_total_weight_collapses_into_last_block() {
        let blocks = plan_blocks(secs(30.0), &folders(&[0.0, 0.0]));
        assert_eq!(blocks[0].span_us(), TimeUs::ZERO);
        assert_eq!(blocks[1].start_us, TimeUs::ZERO);
        assert_eq!(blocks[1].end_us, secs(30.0));
    }

    #[test]
    fn fetched_duration_includes_pads_and_speed() {
        let specs = vec![
            FolderSpec::new("a", 1.0).with_speed(2.0),
            FolderSpec::new("b", 1.0).with_speed(0.5),
        ];
        let plan = TimelinePlan::new(secs(20.0), &specs, Transition::crossfade(1.0));
        let a_last = plan.chunks.iter().rfind(|c| c.block_index == 0).unwrap();
        let b_first = plan.chunks.iter().find(|c| c.block_index == 1).unwrap();

        assert_eq!(a_last.visual_duration_us(), secs(11.0));
        assert_eq!(a_last.source_duration_us(), secs(22.0));
        assert_eq!(b_first.visual_duration_us(), secs(11.0));
        assert_eq!(b_first.source_duration_us(), secs(5.5));
    }

    #[test]
    fn plan_carries_random_cut_bounds() {
        let specs = vec![FolderSpec::new("a", 1.0).with_random_cuts(2.0, 4.0)];
        let plan = TimelinePlan::new(secs(10.0), &specs, Transition::none());
        assert_eq!(plan.blocks[0].random_cut, Some(ClipBounds::from_seconds(2.0, 4.0)));
        assert_eq!(plan.chunks[0].random_cut, Some(ClipBounds::from_seconds(2.0, 4.0)));
    }

    #[test]
    fn no_folders_no_plan() {
        let plan = TimelinePlan::new(secs(10.0), &[], Transition::none());
        assert!(plan.blocks.is_empty());
        assert!(plan.chunks.is_empty());
    }
}
