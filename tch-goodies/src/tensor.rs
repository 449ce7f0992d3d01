use crate::common::*;

pub trait TensorExt {
    fn unzip_first(&self) -> Option<Vec<Tensor>>;

    fn is_empty(&self) -> bool;

    /// Stacks the tensors along a new leading dimension if all of them share
    /// the same shape. Returns `None` for an empty or ragged input.
    fn f_stack_if_same_shape(tensors: &[impl Borrow<Tensor>]) -> Result<Option<Tensor>>;

    fn stack_if_same_shape(tensors: &[impl Borrow<Tensor>]) -> Option<Tensor> {
        Self::f_stack_if_same_shape(tensors).unwrap()
    }

    /// Repeats row `i` along dimension 0 `counts[i]` times, keeping the row order.
    fn f_repeat_rows(&self, counts: &[i64]) -> Result<Tensor>;

    fn repeat_rows(&self, counts: &[i64]) -> Tensor {
        self.f_repeat_rows(counts).unwrap()
    }

    /// Splits dimension 0 into consecutive groups of `counts[i]` rows and keeps
    /// the first row of every group. Empty groups yield a zero-filled row.
    fn f_first_of_groups(&self, counts: &[i64]) -> Result<Tensor>;

    fn first_of_groups(&self, counts: &[i64]) -> Tensor {
        self.f_first_of_groups(counts).unwrap()
    }

    /// Builds a zero-dimensional tensor.
    fn scalar<T>(value: T) -> Tensor
    where
        T: Element;

    /// Copies the elements in row-major order.
    fn f_flat_values<T>(&self) -> Result<Vec<T>>
    where
        T: Element;
}

impl TensorExt for Tensor {
    fn unzip_first(&self) -> Option<Vec<Tensor>> {
        let first_dim = *self.size().first()?;
        let tensors: Vec<_> = (0..first_dim).map(|index| self.select(0, index)).collect();
        Some(tensors)
    }

    fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    fn f_stack_if_same_shape(tensors: &[impl Borrow<Tensor>]) -> Result<Option<Tensor>> {
        let first_shape = match tensors.first() {
            Some(first) => first.borrow().size(),
            None => return Ok(None),
        };
        let same_shape = tensors
            .iter()
            .all(|tensor| tensor.borrow().size() == first_shape);
        if !same_shape {
            log::debug!("cannot stack {} tensors of different shapes", tensors.len());
            return Ok(None);
        }
        let tensors: Vec<&Tensor> = tensors.iter().map(|tensor| tensor.borrow()).collect();
        Ok(Some(Tensor::f_stack(&tensors, 0)?))
    }

    fn f_repeat_rows(&self, counts: &[i64]) -> Result<Tensor> {
        let num_rows = *self
            .size()
            .first()
            .ok_or_else(|| format_err!("cannot repeat rows of a zero-dimensional tensor"))?;
        ensure!(
            num_rows == counts.len() as i64,
            "tensor batch size ({}) doesn't match the number of repeat counts ({})",
            num_rows,
            counts.len()
        );
        ensure!(
            counts.iter().all(|&count| count >= 0),
            "all repeat counts must be non-negative"
        );

        let index: Vec<i64> = counts
            .iter()
            .enumerate()
            .flat_map(|(row, &count)| iter::repeat(row as i64).take(count as usize))
            .collect();
        let index = Tensor::of_slice(&index).to_device(self.device());
        Ok(self.f_index_select(0, &index)?)
    }

    fn f_first_of_groups(&self, counts: &[i64]) -> Result<Tensor> {
        let shape = self.size();
        let (&num_rows, row_shape) = shape
            .split_first()
            .ok_or_else(|| format_err!("cannot gather rows of a zero-dimensional tensor"))?;
        ensure!(
            counts.iter().all(|&count| count >= 0),
            "all group sizes must be non-negative"
        );
        let total: i64 = counts.iter().sum();
        ensure!(
            total == num_rows,
            "tensor size ({}) doesn't match the sum of group sizes ({})",
            num_rows,
            total
        );

        let options = (self.kind(), self.device());
        if counts.is_empty() {
            let empty_shape: Vec<i64> = iter::once(0).chain(row_shape.iter().cloned()).collect();
            return Ok(Tensor::f_zeros(&empty_shape, options)?);
        }

        let mut offset = 0;
        let rows: Vec<Tensor> = counts
            .iter()
            .map(|&count| -> Result<_> {
                let row = if count > 0 {
                    self.f_select(0, offset)?
                } else {
                    Tensor::f_zeros(row_shape, options)?
                };
                offset += count;
                Ok(row)
            })
            .try_collect()?;
        Ok(Tensor::f_stack(&rows, 0)?)
    }

    fn scalar<T>(value: T) -> Tensor
    where
        T: Element,
    {
        Tensor::of_slice(&[value]).reshape(&[])
    }

    fn f_flat_values<T>(&self) -> Result<Vec<T>>
    where
        T: Element,
    {
        let flat = self
            .f_to_device(Device::Cpu)?
            .f_to_kind(T::KIND)?
            .f_contiguous()?
            .f_reshape(&[-1])?;
        Ok(Vec::<T>::from(&flat))
    }
}
