use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ViewerError, ViewerResult};

/// Which registered transforms a render honours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transformations {
    pub rotate: bool,
    pub reorder: bool,
}

impl Transformations {
    pub const ALL: Self = Self {
        rotate: true,
        reorder: true,
    };

    pub const NONE: Self = Self {
        rotate: false,
        reorder: false,
    };
}

impl Default for Transformations {
    fn default() -> Self {
        Self::ALL
    }
}

/// Normalize an angle in degrees to one of 0, 90, 180, 270.
pub fn normalize_angle(angle: i32) -> ViewerResult<u16> {
    if angle % 90 != 0 {
        return Err(ViewerError::InvalidRotation { angle });
    }
    Ok(angle.rem_euclid(360) as u16)
}

/// Presentation order and rotation of every page of one document.
///
/// `order[i]` is the original page number shown at position `i + 1`;
/// `rotations[n - 1]` is the rotation of original page `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTransformState {
    order: Vec<u32>,
    rotations: Vec<u16>,
}

impl PageTransformState {
    /// Identity state: original order, no rotation.
    pub fn identity(page_count: u32) -> Self {
        Self {
            order: (1..=page_count).collect(),
            rotations: vec![0; page_count as usize],
        }
    }

    pub fn page_count(&self) -> u32 {
        self.order.len() as u32
    }

    /// Original page numbers in presentation order.
    pub fn order(&self) -> &[u32] {
        &self.order
    }

    /// Rotation of an original page, in degrees.
    pub fn rotation(&self, page: u32) -> u16 {
        page.checked_sub(1)
            .and_then(|i| self.rotations.get(i as usize))
            .copied()
            .unwrap_or(0)
    }

    /// 1-based presentation position of an original page.
    pub fn position_of(&self, page: u32) -> Option<u32> {
        self.order
            .iter()
            .position(|&p| p == page)
            .map(|i| i as u32 + 1)
    }

    pub fn is_identity(&self) -> bool {
        self.rotations.iter().all(|&r| r == 0)
            && self.order.iter().enumerate().all(|(i, &p)| p == i as u32 + 1)
    }

    fn check_page(&self, page: u32) -> ViewerResult<()> {
        if page == 0 || page > self.page_count() {
            return Err(ViewerError::InvalidPageNumber {
                page,
                page_count: self.page_count(),
            });
        }
        Ok(())
    }

    /// Set the absolute rotation of an original page. Last write wins.
    pub fn rotate(&mut self, page: u32, angle: i32) -> ViewerResult<()> {
        self.check_page(page)?;
        let angle = normalize_angle(angle)?;
        self.rotations[(page - 1) as usize] = angle;
        Ok(())
    }

    /// Move the page at position `current` to position `new`, shifting the
    /// pages in between by one.
    pub fn reorder(&mut self, current: u32, new: u32) -> ViewerResult<()> {
        self.check_page(current)?;
        self.check_page(new)?;
        let page = self.order.remove((current - 1) as usize);
        self.order.insert((new - 1) as usize, page);
        Ok(())
    }

    /// The state as seen by a render honouring only `enabled` transforms.
    pub fn effective(&self, enabled: Transformations) -> Self {
        let mut view = self.clone();
        if !enabled.rotate {
            view.rotations.iter_mut().for_each(|r| *r = 0);
        }
        if !enabled.reorder {
            view.order = (1..=self.page_count()).collect();
        }
        view
    }

    /// Stable digest of order and rotations, used as a cache sub-key.
    pub fn fingerprint(&self) -> String {
        if self.is_identity() {
            return "identity".to_string();
        }
        let mut hasher = Sha256::new();
        for page in &self.order {
            hasher.update(page.to_le_bytes());
        }
        hasher.update(b"|");
        for rotation in &self.rotations {
            hasher.update(rotation.to_le_bytes());
        }
        hex::encode(&hasher.finalize()[..16])
    }
}
