//! Decoding and encoding of flat mount-instruction batches
use crate::errors::{ReconcilerError, Result};
use crate::instruction::{int_word, lookup, InstructionSpec, MountInstruction, ObjectSlot, INSTRUCTION_FLAG_MULTIPLE};
use crate::mounting_manager::MountingManager;
use crate::surface::MountingSink;
use crate::types::SurfaceId;
use log::{debug, error, trace, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential decoder over an int buffer and its parallel object buffer.
///
/// Yields one instruction per repetition of each record, in buffer order.
/// After the first error the iterator is exhausted.
pub struct BatchDecoder<'a> {
    ints: &'a [i32],
    objects: &'a [ObjectSlot],
    int_pos: usize,
    object_pos: usize,
    current: Option<(&'static InstructionSpec, usize)>,
    done: bool,
}

impl<'a> BatchDecoder<'a> {
    pub fn new(ints: &'a [i32], objects: &'a [ObjectSlot]) -> Self {
        BatchDecoder {
            ints,
            objects,
            int_pos: 0,
            object_pos: 0,
            current: None,
            done: false,
        }
    }

    /// Int words consumed so far.
    pub fn int_position(&self) -> usize {
        self.int_pos
    }

    /// Object slots consumed so far.
    pub fn object_position(&self) -> usize {
        self.object_pos
    }

    fn take_ints(&mut self, needed: usize) -> Result<&'a [i32]> {
        let available = self.ints.len() - self.int_pos;
        if available < needed {
            return Err(ReconcilerError::BufferUnderrun {
                buffer: "int",
                offset: self.int_pos,
                needed,
                available,
            });
        }
        let ints: &'a [i32] = self.ints;
        let words = &ints[self.int_pos..self.int_pos + needed];
        self.int_pos += needed;
        Ok(words)
    }

    fn take_objects(&mut self, needed: usize) -> Result<&'a [ObjectSlot]> {
        let available = self.objects.len() - self.object_pos;
        if available < needed {
            return Err(ReconcilerError::BufferUnderrun {
                buffer: "object",
                offset: self.object_pos,
                needed,
                available,
            });
        }
        let objects: &'a [ObjectSlot] = self.objects;
        let slots = &objects[self.object_pos..self.object_pos + needed];
        self.object_pos += needed;
        Ok(slots)
    }

    fn read_record_header(&mut self) -> Result<(&'static InstructionSpec, usize)> {
        let offset = self.int_pos;
        let raw = self.take_ints(1)?[0];
        let code = raw & !INSTRUCTION_FLAG_MULTIPLE;
        let spec = lookup(code).ok_or(ReconcilerError::UnknownInstruction { code, offset })?;
        let count = if raw & INSTRUCTION_FLAG_MULTIPLE != 0 {
            let count_offset = self.int_pos;
            let count = self.take_ints(1)?[0];
            usize::try_from(count).map_err(|_| ReconcilerError::InvalidRepeatCount {
                count,
                offset: count_offset,
            })?
        } else {
            1
        };
        trace!("BatchDecoder: record {:?} x{} at offset {}", spec.kind, count, offset);
        Ok((spec, count))
    }

    fn decode_one(&mut self, spec: &'static InstructionSpec) -> Result<MountInstruction> {
        let ints = self.take_ints(spec.int_words)?;
        let object_offset = self.object_pos;
        let objects = self.take_objects(spec.object_slots)?;
        (spec.decode)(ints, objects, object_offset)
    }

    fn step(&mut self) -> Option<Result<MountInstruction>> {
        loop {
            if let Some((spec, remaining)) = self.current {
                if remaining > 0 {
                    self.current = Some((spec, remaining - 1));
                    return Some(self.decode_one(spec));
                }
                self.current = None;
            }
            if self.int_pos >= self.ints.len() {
                if self.object_pos < self.objects.len() {
                    warn!(
                        "BatchDecoder: {} object slots left unread after the last record",
                        self.objects.len() - self.object_pos
                    );
                }
                return None;
            }
            match self.read_record_header() {
                Ok(record) => self.current = Some(record),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

impl Iterator for BatchDecoder<'_> {
    type Item = Result<MountInstruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.step();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Decodes the whole batch without applying it.
pub fn decode_all(ints: &[i32], objects: &[ObjectSlot]) -> Result<Vec<MountInstruction>> {
    BatchDecoder::new(ints, objects).collect()
}

/// Decodes and applies instructions one at a time. On error, instructions
/// already applied stay applied and the rest of the batch is abandoned.
pub fn execute<S: MountingSink + ?Sized>(ints: &[i32], objects: &[ObjectSlot], sink: &mut S) -> Result<usize> {
    let mut applied = 0;
    for instruction in BatchDecoder::new(ints, objects) {
        instruction?.execute(sink)?;
        applied += 1;
    }
    Ok(applied)
}

/// Exact `(int words, object slots)` needed to encode `instructions`.
/// Consecutive instructions of one kind share a record.
pub fn buffer_sizes(instructions: &[MountInstruction]) -> (usize, usize) {
    let mut int_size = 0;
    let mut object_size = 0;
    for run in instructions.chunk_by(|a, b| a.kind() == b.kind()) {
        let (int_words, object_slots) = run[0].kind().layout();
        int_size += if run.len() == 1 { 1 } else { 2 }; // type[, count]
        int_size += run.len() * int_words;
        object_size += run.len() * object_slots;
    }
    (int_size, object_size)
}

/// Writes `instructions` in the record layout read by [`BatchDecoder`].
/// Fails when a count or index does not fit in an int word.
pub fn encode(instructions: &[MountInstruction]) -> Result<(Vec<i32>, Vec<ObjectSlot>)> {
    let (int_size, object_size) = buffer_sizes(instructions);
    let mut ints = Vec::with_capacity(int_size);
    let mut objects = Vec::with_capacity(object_size);
    for run in instructions.chunk_by(|a, b| a.kind() == b.kind()) {
        let code = run[0].kind().code();
        if run.len() == 1 {
            ints.push(code);
        } else {
            ints.push(code | INSTRUCTION_FLAG_MULTIPLE);
            ints.push(int_word("repeat count", run.len())?);
        }
        for instruction in run {
            instruction.write_payload(&mut ints, &mut objects)?;
        }
    }
    debug_assert_eq!((ints.len(), objects.len()), (int_size, object_size));
    Ok((ints, objects))
}

/// One encoded batch targeting a single surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMountItem {
    pub surface_id: SurfaceId,
    pub commit_number: u64,
    pub ints: Vec<i32>,
    pub objects: Vec<ObjectSlot>,
}

impl BatchMountItem {
    pub fn new(surface_id: SurfaceId, commit_number: u64, ints: Vec<i32>, objects: Vec<ObjectSlot>) -> Self {
        BatchMountItem {
            surface_id,
            commit_number,
            ints,
            objects,
        }
    }

    pub fn from_instructions(
        surface_id: SurfaceId,
        commit_number: u64,
        instructions: &[MountInstruction],
    ) -> Result<Self> {
        let (ints, objects) = encode(instructions)?;
        Ok(BatchMountItem::new(surface_id, commit_number, ints, objects))
    }

    pub fn is_empty(&self) -> bool {
        self.ints.is_empty()
    }

    pub fn decode(&self) -> Result<Vec<MountInstruction>> {
        decode_all(&self.ints, &self.objects)
    }

    /// Applies the batch to its surface. A missing or stopped surface skips
    /// the batch; decode and mutation errors abort it.
    pub fn execute(&self, manager: &mut MountingManager) -> Result<()> {
        let Some(surface) = manager.surface_mut(self.surface_id) else {
            error!(
                "BatchMountItem: skipping batch of commit {}; no surface [{}] found",
                self.commit_number, self.surface_id
            );
            return Ok(());
        };
        if surface.is_stopped() {
            error!(
                "BatchMountItem: skipping batch of commit {}; surface [{}] is stopped",
                self.commit_number, self.surface_id
            );
            return Ok(());
        }
        let applied = execute(&self.ints, &self.objects, surface).inspect_err(|err| {
            error!(
                "BatchMountItem: batch of commit {} on surface [{}] failed: {}",
                self.commit_number, self.surface_id, err
            );
        })?;
        debug!(
            "BatchMountItem: applied {} instructions of commit {} to surface [{}]",
            applied, self.commit_number, self.surface_id
        );
        Ok(())
    }
}

impl fmt::Display for BatchMountItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BatchMountItem [S:{}] commit {}: {} ints, {} objects",
            self.surface_id,
            self.commit_number,
            self.ints.len(),
            self.objects.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::InstructionKind;
    use crate::types::{EdgeInsets, Tag};

    const DELETE: i32 = InstructionKind::Delete as i32;
    const INSERT: i32 = InstructionKind::Insert as i32;
    const REMOVE: i32 = InstructionKind::Remove as i32;

    #[test]
    fn delete_then_insert() {
        let ints = [DELETE, 7, INSERT, 9, 0, 2];
        let mut decoder = BatchDecoder::new(&ints, &[]);
        assert_eq!(decoder.next().unwrap().unwrap(), MountInstruction::Delete { tag: 7 });
        assert_eq!(decoder.int_position(), 2);
        assert_eq!(
            decoder.next().unwrap().unwrap(),
            MountInstruction::Insert { tag: 9, parent_tag: 0, index: 2 }
        );
        assert_eq!(decoder.int_position(), 6);
        assert!(decoder.next().is_none());
    }

    #[test]
    fn multiple_flag_repeats_record() {
        let ints = [REMOVE | INSTRUCTION_FLAG_MULTIPLE, 3, 4, 1, 0, 5, 1, 0, 6, 1, 0];
        let removed: Vec<Tag> = decode_all(&ints, &[]).unwrap().iter().map(|i| i.tag()).collect();
        assert_eq!(removed, vec![4, 5, 6]);
    }

    #[test]
    fn zero_repeat_count_is_an_empty_record() {
        let ints = [DELETE | INSTRUCTION_FLAG_MULTIPLE, 0, DELETE, 3];
        assert_eq!(decode_all(&ints, &[]).unwrap(), vec![MountInstruction::Delete { tag: 3 }]);
    }

    #[test]
    fn negative_repeat_count_fails() {
        let ints = [DELETE | INSTRUCTION_FLAG_MULTIPLE, -2];
        assert!(matches!(
            decode_all(&ints, &[]),
            Err(ReconcilerError::InvalidRepeatCount { count: -2, offset: 1 })
        ));
    }

    #[test]
    fn unknown_code_stops_the_decoder() {
        let ints = [DELETE, 1, 6, 99, DELETE, 2];
        let mut decoder = BatchDecoder::new(&ints, &[]);
        assert!(decoder.next().unwrap().is_ok());
        assert!(matches!(
            decoder.next(),
            Some(Err(ReconcilerError::UnknownInstruction { code: 6, offset: 2 }))
        ));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn truncated_record_underruns() {
        let ints = [INSERT, 9, 0];
        assert!(matches!(
            decode_all(&ints, &[]),
            Err(ReconcilerError::BufferUnderrun { buffer: "int", offset: 1, needed: 3, available: 2 })
        ));
        let props = [InstructionKind::UpdateProps as i32, 4];
        assert!(matches!(
            decode_all(&props, &[]),
            Err(ReconcilerError::BufferUnderrun { buffer: "object", .. })
        ));
    }

    #[test]
    fn encoder_groups_runs() {
        let instructions = vec![
            MountInstruction::Delete { tag: 1 },
            MountInstruction::Delete { tag: 2 },
            MountInstruction::UpdatePadding { tag: 3, padding: EdgeInsets { left: 1, top: 2, right: 3, bottom: 4 } },
            MountInstruction::Delete { tag: 4 },
        ];
        let (ints, objects) = encode(&instructions).unwrap();
        assert_eq!(
            ints,
            vec![DELETE | INSTRUCTION_FLAG_MULTIPLE, 2, 1, 2, 512, 3, 1, 2, 3, 4, DELETE, 4]
        );
        assert!(objects.is_empty());
        assert_eq!(buffer_sizes(&instructions), (12, 0));
        assert_eq!(decode_all(&ints, &objects).unwrap(), instructions);
    }
}
