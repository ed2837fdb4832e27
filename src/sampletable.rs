//! Sample-table synthesis (L4, §4.6): turns a track's sample timeline
//! into the `stbl` family of boxes (`stts`/`ctts`/`cslg`/`stss`/`sgpd`+
//! `sbgp`), plus the `elst` edit-list unroll and the late `stco`
//! chunk-offset patch.
use crate::boxes::moov::EditListEntry;
use crate::boxes::{
    ChunkOffsetBox, CompositionOffsetBox, CompositionOffsetEntry, CompositionToDecodeBox, SampleGroupDescriptionBox,
    SampleToGroupBox, SampleToGroupEntry, SyncSampleBox, TimeToSampleBox, TimeToSampleEntry,
};
use crate::model::EditUnit;
use crate::types::FourCC;

/// Inputs to the per-sample timing formulas (§4.6).
#[derive(Debug, Clone)]
pub struct TimelineInput {
    pub decode_order: Vec<u32>,
    pub display_order: Vec<u32>,
    pub display_rate: u32,
    pub clock_ticks: u32,
    pub decode_start_ticks: i64,
    pub display_start_ticks: i64,
}

/// §9 open question: the writer's original expressions used `*=`
/// rather than `=` for `decode_time`/`display_time`. Both are exposed
/// so the caller (or a golden-file test) can disambiguate; the `=`
/// behavior is the default since it matches the documented formula.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisOptions {
    pub quirky_multiply_assign: bool,
    /// `cslg.compositionEndTime`: the writer leaves this at 0 with no
    /// commentary (§9); exposed here rather than hardcoded so a caller
    /// can override it once the contract hole is resolved.
    pub composition_end_time: i64,
}

impl Default for SynthesisOptions {
    fn default() -> SynthesisOptions {
        SynthesisOptions {
            quirky_multiply_assign: false,
            composition_end_time: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub decode_time: Vec<i64>,
    pub display_time: Vec<i64>,
    pub display_offset: Vec<i64>,
}

/// Computes per-sample decode/display times and their offset (§4.6).
///
/// The quirky `*=` form only makes sense from the second sample onward
/// (there is no prior value to multiply against for sample 0), so it
/// is applied as `time = time.max(1) * step + start` past the first
/// sample and falls back to the plain formula for `i == 0` -- this is
/// the most literal reading of "a faithful port should expose both
/// behaviors" without inventing a seed value the source never states.
pub fn compute_timeline(input: &TimelineInput, opts: &SynthesisOptions) -> Timeline {
    let step = (input.clock_ticks / input.display_rate.max(1)) as i64;
    let mut decode_time = Vec::with_capacity(input.decode_order.len());
    let mut display_time = Vec::with_capacity(input.display_order.len());
    for (i, order) in input.decode_order.iter().enumerate() {
        let plain = *order as i64 * step + input.decode_start_ticks;
        let t = if opts.quirky_multiply_assign && i > 0 {
            decode_time[i - 1] * step + input.decode_start_ticks
        } else {
            plain
        };
        decode_time.push(t);
    }
    for (i, order) in input.display_order.iter().enumerate() {
        let plain = *order as i64 * step + input.display_start_ticks;
        let t = if opts.quirky_multiply_assign && i > 0 {
            display_time[i - 1] * step + input.display_start_ticks
        } else {
            plain
        };
        display_time.push(t);
    }
    let display_offset = decode_time
        .iter()
        .zip(display_time.iter())
        .map(|(d, p)| p - d)
        .collect();
    Timeline { decode_time, display_time, display_offset }
}

/// §8 property 7: `ctts_required ⇔ ∃ i: display_offset[i] ≠ 0`.
pub fn ctts_required(display_offset: &[i64]) -> bool {
    display_offset.iter().any(|&o| o != 0)
}

/// §8 property 7: `cslg_required ⇔ ∃ i: display_offset[i] < 0`. Implies
/// `ctts` version 1 (signed) rather than version 0.
pub fn cslg_required(display_offset: &[i64]) -> bool {
    display_offset.iter().any(|&o| o < 0)
}

/// Run-length encodes `display_offset` into `ctts` entries, coalescing
/// consecutive equal values.
pub fn synthesize_ctts(display_offset: &[i64]) -> CompositionOffsetBox {
    let mut entries: Vec<CompositionOffsetEntry> = Vec::new();
    for &offset in display_offset {
        match entries.last_mut() {
            Some(last) if last.offset as i64 == offset => last.count += 1,
            _ => entries.push(CompositionOffsetEntry { count: 1, offset: offset as i32 }),
        }
    }
    CompositionOffsetBox { entries }
}

/// `cslg` fields (§4.6), computed only when `cslg_required` is true.
pub fn synthesize_cslg(display_offset: &[i64], display_start_ticks: i64, opts: &SynthesisOptions) -> CompositionToDecodeBox {
    let min = display_offset.iter().copied().min().unwrap_or(0);
    let max = display_offset.iter().copied().max().unwrap_or(0);
    CompositionToDecodeBox {
        composition_to_dts_shift: min as i32,
        least_decode_to_display_delta: min as i32,
        greatest_decode_to_display_delta: max as i32,
        composition_start_time: display_start_ticks as i32,
        composition_end_time: opts.composition_end_time as i32,
    }
}

/// A single run `(sample_count=N, sample_delta=clock_ticks/display_rate)`
/// -- constant display rate is assumed by the writer (§4.6).
pub fn synthesize_stts(sample_count: u32, clock_ticks: u32, display_rate: u32) -> TimeToSampleBox {
    TimeToSampleBox {
        entries: vec![TimeToSampleEntry {
            count: sample_count,
            delta: clock_ticks / display_rate.max(1),
        }],
    }
}

/// One-based sample indices where `is_sync[i] == true` (§4.6).
pub fn synthesize_stss(is_sync: &[bool]) -> SyncSampleBox {
    SyncSampleBox {
        sample_numbers: is_sync
            .iter()
            .enumerate()
            .filter_map(|(i, &sync)| sync.then(|| (i + 1) as u32))
            .collect(),
    }
}

/// Reference-picture sample grouping (`refs`, §4.6).
pub struct RefsGrouping {
    pub sgpd: SampleGroupDescriptionBox,
    pub sbgp: SampleToGroupBox,
}

/// `ref_pic_indices[i]` lists, per sample, the (zero-based) indices of
/// the samples it references for decode.
pub fn synthesize_refs_grouping(ref_pic_indices: &[Vec<u32>]) -> RefsGrouping {
    let n = ref_pic_indices.len();
    let mut is_referenced = vec![false; n];
    for refs in ref_pic_indices {
        for &idx in refs {
            if let Some(flag) = is_referenced.get_mut(idx as usize) {
                *flag = true;
            }
        }
    }
    let tags: Vec<u32> = (0..n).map(|i| if is_referenced[i] { (i + 1) as u32 } else { 0 }).collect();
    let tuples: Vec<(u32, Vec<u32>)> = (0..n)
        .map(|i| (tags[i], ref_pic_indices[i].iter().map(|x| x + 1).collect()))
        .collect();

    let mut unique: Vec<(u32, Vec<u32>)> = Vec::new();
    let mut entry_index_per_sample = Vec::with_capacity(n);
    for tuple in &tuples {
        let pos = unique.iter().position(|u| u == tuple);
        let idx = match pos {
            Some(idx) => idx,
            None => {
                unique.push(tuple.clone());
                unique.len() - 1
            }
        };
        entry_index_per_sample.push((idx + 1) as u32);
    }

    let sgpd = SampleGroupDescriptionBox {
        grouping_type: FourCC::new("refs"),
        default_length: None,
        entries: unique
            .iter()
            .map(|(tag, refs)| {
                let mut bytes = Vec::with_capacity(4 + 4 * refs.len());
                bytes.extend_from_slice(&tag.to_be_bytes());
                for r in refs {
                    bytes.extend_from_slice(&r.to_be_bytes());
                }
                bytes
            })
            .collect(),
    };

    let mut sbgp_entries: Vec<SampleToGroupEntry> = Vec::new();
    for &group_index in &entry_index_per_sample {
        match sbgp_entries.last_mut() {
            Some(last) if last.group_description_index == group_index => last.sample_count += 1,
            _ => sbgp_entries.push(SampleToGroupEntry { sample_count: 1, group_description_index: group_index }),
        }
    }
    let sbgp = SampleToGroupBox {
        grouping_type: FourCC::new("refs"),
        grouping_type_parameter: None,
        entries: sbgp_entries,
    };

    RefsGrouping { sgpd, sbgp }
}

/// `DecodePts` edit-list unroll (§4.6): converts a track's `EditUnit`
/// sequence into `elst` entries plus the track's total duration.
pub fn synthesize_edit_list(units: &[EditUnit], movie_timescale: u32) -> (Vec<EditListEntry>, u32) {
    let mut entries = Vec::with_capacity(units.len());
    let mut infinite = false;
    let mut total_ticks: i64 = 0;

    for unit in units {
        let (segment_duration, media_time, media_rate, span_ms, repeat) = match *unit {
            EditUnit::Empty { time_span_ms } => (ms_to_ticks(time_span_ms, movie_timescale), -1i64, 1.0, time_span_ms, 0i32),
            EditUnit::Dwell { time_span_ms, mdia_time_ms } => {
                (ms_to_ticks(time_span_ms, movie_timescale), ms_to_ticks(mdia_time_ms, movie_timescale), 0.0, time_span_ms, 0)
            }
            EditUnit::Shift { time_span_ms, mdia_time_ms, numb_rept } => {
                (ms_to_ticks(time_span_ms, movie_timescale), ms_to_ticks(mdia_time_ms, movie_timescale), 1.0, time_span_ms, numb_rept)
            }
        };
        entries.push(EditListEntry {
            segment_duration: segment_duration as u64,
            media_time,
            media_rate: crate::types::FixedFloat16_16::from(media_rate),
        });
        if matches!(unit, EditUnit::Shift { numb_rept, .. } if *numb_rept == -1) {
            infinite = true;
        } else if !infinite {
            total_ticks += ms_to_ticks(span_ms, movie_timescale) * (repeat.max(0) as i64 + 1);
        }
    }

    let duration = if infinite { 0xFFFF_FFFFu32 } else { total_ticks as u32 };
    (entries, duration)
}

fn ms_to_ticks(ms: u32, timescale: u32) -> i64 {
    ms as i64 * timescale as i64 / 1000
}

/// Adds `mdat_offset + 8` (the `mdat` header size) to every chunk
/// offset, once the `mdat`'s file position is known (§4.6).
pub fn patch_chunk_offsets(stco: &mut ChunkOffsetBox, mdat_offset: u64) {
    let patch = mdat_offset + 8;
    for entry in stco.offsets.iter_mut() {
        *entry += patch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S4 -- Sample timeline (§8): ten samples, display_rate=30,
    /// clock_ticks=90000, decode_order=[0..9],
    /// display_order=[0,2,1,4,3,6,5,8,7,9].
    #[test]
    fn s4_sample_timeline() {
        let input = TimelineInput {
            decode_order: (0..10).collect(),
            display_order: vec![0, 2, 1, 4, 3, 6, 5, 8, 7, 9],
            display_rate: 30,
            clock_ticks: 90000,
            decode_start_ticks: 0,
            display_start_ticks: 0,
        };
        let opts = SynthesisOptions::default();
        let timeline = compute_timeline(&input, &opts);
        assert!(ctts_required(&timeline.display_offset));
        assert!(cslg_required(&timeline.display_offset));
        let cslg = synthesize_cslg(&timeline.display_offset, input.display_start_ticks, &opts);
        assert_eq!(cslg.least_decode_to_display_delta, -3000);
        assert_eq!(cslg.greatest_decode_to_display_delta, 3000);
        assert_eq!(timeline.display_offset[9], 0);
    }

    #[test]
    fn ctts_not_required_for_constant_offset() {
        assert!(!ctts_required(&[0, 0, 0]));
        assert!(!cslg_required(&[0, 5, 0]));
        assert!(cslg_required(&[0, -5, 0]));
    }

    /// S5 -- Edit list looping (§8): a `shift` unit with `numb_rept=-1`
    /// emits `tkhd.duration = 0xFFFFFFFF`.
    #[test]
    fn s5_infinite_loop_edit_list() {
        let units = vec![EditUnit::Shift { time_span_ms: 1000, mdia_time_ms: 0, numb_rept: -1 }];
        let (entries, duration) = synthesize_edit_list(&units, 1000);
        assert_eq!(duration, 0xFFFF_FFFF);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].media_time, 0);
    }

    #[test]
    fn finite_repeat_duration() {
        let units = vec![EditUnit::Shift { time_span_ms: 500, mdia_time_ms: 0, numb_rept: 3 }];
        let (_, duration) = synthesize_edit_list(&units, 1000);
        assert_eq!(duration, 500 * 4);
    }

    #[test]
    fn stss_one_based_indices() {
        let stss = synthesize_stss(&[true, false, false, true]);
        assert_eq!(stss.sample_numbers, vec![1, 4]);
    }

    #[test]
    fn refs_grouping_dedups_tuples() {
        let refs = vec![vec![], vec![0], vec![0]];
        let grouping = synthesize_refs_grouping(&refs);
        assert_eq!(grouping.sgpd.entries.len(), 2);
        assert_eq!(grouping.sbgp.entries.len(), 2);
        assert_eq!(grouping.sbgp.entries[0].sample_count, 1);
        assert_eq!(grouping.sbgp.entries[1].sample_count, 2);
    }

    #[test]
    fn chunk_offset_patch_adds_mdat_header() {
        let mut stco = ChunkOffsetBox { large: false, offsets: vec![0, 100] };
        patch_chunk_offsets(&mut stco, 1000);
        assert_eq!(stco.offsets, vec![1008, 1108]);
    }
}
