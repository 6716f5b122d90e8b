/// Latest value of a stream together with a three-valued loading flag.
///
/// `is_loading == None` means nothing was attempted yet, `Some(true)` that a
/// listener is in flight and `Some(false)` that a value (possibly absent) was
/// delivered.
#[derive(Clone, Debug, PartialEq)]
pub struct DataStatus<T> {
    pub data: Option<T>,
    pub is_loading: Option<bool>,
}

impl<T> DataStatus<T> {
    pub fn loading() -> Self {
        Self {
            data: None,
            is_loading: Some(true),
        }
    }

    pub fn loaded(data: Option<T>) -> Self {
        Self {
            data,
            is_loading: Some(false),
        }
    }

    pub fn is_uninitialized(&self) -> bool {
        self.is_loading.is_none()
    }

    /// `true` once a value was delivered but it was empty.
    pub fn is_confirmed_empty(&self) -> bool {
        self.is_loading == Some(false) && self.data.is_none()
    }
}

impl<T> Default for DataStatus<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: None,
        }
    }
}
