//! Moving tensor data across devices.

use crate::{
    common::*,
    field::FieldSpec,
    record::Record,
    value::FieldValue,
    visit::{self, FieldVisitor},
};

impl Record {
    /// Moves every tensor of the record and its nested records to the device.
    ///
    /// CUDA devices are checked first, see [cuda_device].
    pub fn to_device(&mut self, device: Device) -> Result<&mut Self> {
        if let Device::Cuda(index) = device {
            cuda_device(index)?;
        }
        visit::walk_mut(self, &mut DeviceVisitor { device })?;
        self.set_device(device);
        Ok(self)
    }

    pub fn to_cpu(&mut self) -> Result<&mut Self> {
        self.to_device(Device::Cpu)
    }

    /// Moves the record to a CUDA device.
    ///
    /// It fails if CUDA is not available or the index exceeds the number of
    /// visible devices.
    pub fn to_gpu(&mut self, index: usize) -> Result<&mut Self> {
        let device = cuda_device(index)?;
        self.to_device(device)
    }
}

/// Checks that the CUDA device with the index is visible.
pub fn cuda_device(index: usize) -> Result<Device> {
    ensure!(
        tch::Cuda::is_available(),
        DataModelError::DeviceUnavailable("CUDA is not available".into())
    );
    let count = tch::Cuda::device_count();
    ensure!(
        (index as i64) < count,
        DataModelError::DeviceUnavailable(format!(
            "CUDA device {} is requested, but only {} devices are visible",
            index, count
        ))
    );
    Ok(Device::Cuda(index))
}

struct DeviceVisitor {
    device: Device,
}

impl FieldVisitor for DeviceVisitor {
    const OPERATION: &'static str = "move";

    fn visit_record(&mut self, record: &mut Record) -> Result<()> {
        record.to_device(self.device)?;
        Ok(())
    }

    fn visit_record_list(&mut self, _field: &FieldSpec, list: &mut [FieldValue]) -> Result<()> {
        list.iter_mut()
            .try_for_each(|item| value_to_device(item, self.device))
    }

    fn visit_value(&mut self, _field: &FieldSpec, value: &mut FieldValue) -> Result<()> {
        value_to_device(value, self.device)
    }
}

fn value_to_device(value: &mut FieldValue, device: Device) -> Result<()> {
    match value {
        FieldValue::Tensor(tensor) => {
            if tensor.device() != device {
                *tensor = tensor.f_to_device(device)?;
            }
        }
        FieldValue::Record(record) => {
            record.to_device(device)?;
        }
        FieldValue::List(list) => {
            list.iter_mut()
                .try_for_each(|item| value_to_device(item, device))?;
        }
        FieldValue::Map(map) => {
            map.values_mut()
                .try_for_each(|item| value_to_device(item, device))?;
        }
        _ => {}
    }
    Ok(())
}
