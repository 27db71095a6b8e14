//! Data instances, streams and sequences.
//!
//! A dynamic data set is a stream of instances tagged with a sequence id
//! and a time id. Consecutive instances that share a sequence id form a
//! [`Sequence`], the unit of local inference and of parallel work.
//! Missing values are encoded as `NaN`.

use lentil_vars::Attributes;
use std::iter::Peekable;

#[derive(Debug, Clone, PartialEq)]
pub struct DataInstance {
    pub sequence_id: u64,
    pub time_id: u64,
    pub values: Vec<f64>,
}

impl DataInstance {
    pub fn new(sequence_id: u64, time_id: u64, values: Vec<f64>) -> Self {
        Self {
            sequence_id,
            time_id,
            values,
        }
    }

    /// `None` if missing
    #[inline]
    pub fn value(&self, attribute: usize) -> Option<f64> {
        self.values.get(attribute).copied().filter(|x| !x.is_nan())
    }
}

/// A finite stream of instances with a fixed schema
pub trait DataStream {
    fn attributes(&self) -> &Attributes;
    fn stream(&self) -> Box<dyn Iterator<Item = DataInstance> + '_>;
}

/// All instances held in memory
#[derive(Debug, Clone)]
pub struct DataOnMemory {
    attributes: Attributes,
    instances: Vec<DataInstance>,
}

impl DataOnMemory {
    pub fn new(attributes: Attributes, instances: Vec<DataInstance>) -> Self {
        Self {
            attributes,
            instances,
        }
    }

    /// Each row is its own sequence of length one
    pub fn from_static_rows(attributes: Attributes, rows: Vec<Vec<f64>>) -> Self {
        let instances = rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| DataInstance::new(i as u64, 0, values))
            .collect();
        Self::new(attributes, instances)
    }

    pub fn instances(&self) -> &[DataInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn push(&mut self, instance: DataInstance) {
        self.instances.push(instance);
    }
}

impl DataStream for DataOnMemory {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn stream(&self) -> Box<dyn Iterator<Item = DataInstance> + '_> {
        Box::new(self.instances.iter().cloned())
    }
}

/// Consecutive instances of one sequence, in time order
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub sequence_id: u64,
    pub instances: Vec<DataInstance>,
}

impl Sequence {
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Group consecutive instances by sequence id
pub fn sequences<I: IntoIterator<Item = DataInstance>>(instances: I) -> Vec<Sequence> {
    let mut ret: Vec<Sequence> = vec![];
    for x in instances {
        match ret.last_mut() {
            Some(seq) if seq.sequence_id == x.sequence_id => seq.instances.push(x),
            _ => ret.push(Sequence {
                sequence_id: x.sequence_id,
                instances: vec![x],
            }),
        }
    }
    ret
}

/// Windows of whole sequences read lazily from an instance stream.
///
/// A window closes at the first sequence boundary once it holds at least
/// `batch_size` instances, so the last window may hold fewer. Nothing
/// past the current window is pulled except the first instance of the
/// next sequence.
pub struct SequenceWindows<I: Iterator<Item = DataInstance>> {
    instances: Peekable<I>,
    batch_size: usize,
}

impl<I: Iterator<Item = DataInstance>> Iterator for SequenceWindows<I> {
    type Item = Vec<Sequence>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut window = vec![];
        let mut count = 0;
        while count < self.batch_size {
            let Some(first) = self.instances.next() else {
                break;
            };
            let sequence_id = first.sequence_id;
            let mut instances = vec![first];
            while let Some(x) = self.instances.next_if(|x| x.sequence_id == sequence_id) {
                instances.push(x);
            }
            count += instances.len();
            window.push(Sequence {
                sequence_id,
                instances,
            });
        }
        if window.is_empty() {
            None
        } else {
            Some(window)
        }
    }
}

pub fn windows<I: IntoIterator<Item = DataInstance>>(
    instances: I,
    batch_size: usize,
) -> SequenceWindows<I::IntoIter> {
    SequenceWindows {
        instances: instances.into_iter().peekable(),
        batch_size: batch_size.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances() -> Vec<DataInstance> {
        vec![
            DataInstance::new(0, 0, vec![1.0]),
            DataInstance::new(0, 1, vec![2.0]),
            DataInstance::new(1, 0, vec![f64::NAN]),
            DataInstance::new(2, 0, vec![3.0]),
            DataInstance::new(2, 1, vec![4.0]),
            DataInstance::new(2, 2, vec![5.0]),
        ]
    }

    #[test]
    fn test_group_sequences() {
        let seqs = sequences(instances());
        assert_eq!(seqs.len(), 3);
        assert_eq!(seqs[0].len(), 2);
        assert_eq!(seqs[1].instances[0].value(0), None);
        assert_eq!(seqs[2].instances[2].value(0), Some(5.0));
    }

    #[test]
    fn test_windows_keep_whole_sequences() {
        let b: Vec<_> = windows(instances(), 2).collect();
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].len(), 1);
        assert_eq!(b[1].len(), 2);

        let b: Vec<_> = windows(instances(), 100).collect();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].iter().map(|s| s.len()).sum::<usize>(), 6);
        assert_eq!(b[0], sequences(instances()));
    }

    #[test]
    fn test_windows_pull_lazily() {
        let mut pulled = 0;
        {
            let stream = instances().into_iter().inspect(|_| pulled += 1);
            let first = windows(stream, 1).next().unwrap();
            assert_eq!(first.len(), 1);
        }
        // the first sequence plus one instance of the next
        assert_eq!(pulled, 3);
    }
}
