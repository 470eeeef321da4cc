use crate::error::{Result, TrainError};

/// How one batch is split across devices.
///
/// `devices[i]` is the index (into the configured device list) that
/// receives `chunk_sizes[i]` consecutive samples. Chunk sizes always sum to
/// the batch size. A plan is computed for every dispatch and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePlan {
    devices: Vec<usize>,
    chunk_sizes: Vec<usize>,
}

impl DevicePlan {
    /// Split `batch_size` samples over `n_devices`, reserving only
    /// `gpu0_share` samples for device 0.
    ///
    /// The other devices get `floor((batch_size - gpu0_share) / (n_devices - 1))`
    /// each, and the remainder goes one sample at a time to devices 1, 2, ...
    /// When the reservation would not leave device 0 with less than the
    /// others, the batch is split evenly instead. With `gpu0_share == 0`
    /// device 0 is left out of the plan entirely.
    pub fn new(batch_size: usize, n_devices: usize, gpu0_share: usize) -> Result<DevicePlan> {
        if n_devices == 0 {
            return Err(TrainError::Config("no devices to plan for".to_string()));
        }
        if n_devices == 1 {
            return Ok(DevicePlan {
                devices: vec![0],
                chunk_sizes: vec![batch_size],
            });
        }

        let unit = match batch_size.checked_sub(gpu0_share) {
            Some(rest) => rest / (n_devices - 1),
            None => return Ok(Self::even(batch_size, n_devices)),
        };
        if gpu0_share >= unit {
            return Ok(Self::even(batch_size, n_devices));
        }

        let mut chunk_sizes = vec![unit; n_devices];
        chunk_sizes[0] = gpu0_share;
        let remainder = batch_size - chunk_sizes.iter().sum::<usize>();
        for size in chunk_sizes.iter_mut().skip(1).take(remainder) {
            *size += 1;
        }

        let mut devices: Vec<usize> = (0..n_devices).collect();
        if gpu0_share == 0 {
            devices.remove(0);
            chunk_sizes.remove(0);
        }
        Ok(DevicePlan {
            devices,
            chunk_sizes,
        })
    }

    /// Even split over all devices; the earliest devices take the remainder.
    pub fn even(batch_size: usize, n_devices: usize) -> DevicePlan {
        let base = batch_size / n_devices;
        let extra = batch_size % n_devices;
        DevicePlan {
            devices: (0..n_devices).collect(),
            chunk_sizes: (0..n_devices).map(|i| base + usize::from(i < extra)).collect(),
        }
    }

    pub fn devices(&self) -> &[usize] {
        &self.devices
    }

    pub fn chunk_sizes(&self) -> &[usize] {
        &self.chunk_sizes
    }

    /// Number of samples covered by the plan.
    pub fn total(&self) -> usize {
        self.chunk_sizes.iter().sum()
    }

    /// Slice `items` into consecutive chunks following the plan.
    ///
    /// Devices whose chunk is empty are skipped. Order is preserved, so
    /// concatenating the per-chunk outputs restores the batch order.
    pub fn split<'a, T>(&self, items: &'a [T]) -> Result<Vec<(usize, &'a [T])>> {
        if items.len() != self.total() {
            return Err(TrainError::InvalidBatch(format!(
                "plan covers {} samples but batch has {}",
                self.total(),
                items.len()
            )));
        }
        let mut out = Vec::with_capacity(self.devices.len());
        let mut start = 0;
        for (&device, &size) in self.devices.iter().zip(&self.chunk_sizes) {
            if size > 0 {
                out.push((device, &items[start..start + size]));
            }
            start += size;
        }
        Ok(out)
    }
}

/// Chunk sizes for splitting `batch_size` samples over `n_devices`.
pub fn plan(batch_size: usize, n_devices: usize, gpu0_share: usize) -> Result<Vec<usize>> {
    Ok(DevicePlan::new(batch_size, n_devices, gpu0_share)?
        .chunk_sizes
        .to_vec())
}
