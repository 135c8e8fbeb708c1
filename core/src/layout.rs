//! Covariance index layout of the composite state
//!
//! The stochastic part of the state is a fixed sequence of field groups. Each group holds
//! `count` elements of the same [FieldKind] and owns a contiguous, non-overlapping range of
//! rows/columns of the covariance matrix. Offsets are computed once by [LayoutBuilder] when
//! the layout is configured and never change afterwards, so every consumer that needs to
//! know "which rows belong to field X" asks the layout instead of slicing by hand.
//!
//! The group order, and therefore the covariance index order, is
//!
//! | Group | Field                          | Kind       | Count   |
//! |-------|--------------------------------|------------|---------|
//! | pos   | WrWM, world position of body   | Vector3    | 1       |
//! | vel   | MvM, body velocity             | Vector3    | 1       |
//! | acb   | accelerometer bias             | Vector3    | 1       |
//! | gyb   | gyroscope bias                 | Vector3    | 1       |
//! | att   | qWM, body to world attitude    | Quaternion | 1       |
//! | vep   | MrMC, camera offset in body    | Vector3    | n_cam   |
//! | vea   | qCM, body to camera rotation   | Quaternion | n_cam   |
//! | dep   | landmark depth parameter       | Scalar     | n_max   |
//! | nor   | landmark bearing               | Bearing    | n_max   |
//!
//! giving a total tangent dimension of `15 + 6 n_cam + 3 n_max`.

use std::fmt::{self, Display};
use std::ops::Range;

/// Kind of a field, which fixes its tangent dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Vector3,
    Quaternion,
    Scalar,
    Bearing,
    Vector2,
}
impl FieldKind {
    pub const fn tangent_dim(self) -> usize {
        match self {
            FieldKind::Vector3 | FieldKind::Quaternion => 3,
            FieldKind::Bearing | FieldKind::Vector2 => 2,
            FieldKind::Scalar => 1,
        }
    }
}

/// Identifies one group of the layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldGroupId {
    Position,
    Velocity,
    AccelerometerBias,
    GyroscopeBias,
    Attitude,
    ExtrinsicTranslation,
    ExtrinsicRotation,
    Depth,
    Bearing,
}
impl FieldGroupId {
    pub const ALL: [FieldGroupId; 9] = [
        FieldGroupId::Position,
        FieldGroupId::Velocity,
        FieldGroupId::AccelerometerBias,
        FieldGroupId::GyroscopeBias,
        FieldGroupId::Attitude,
        FieldGroupId::ExtrinsicTranslation,
        FieldGroupId::ExtrinsicRotation,
        FieldGroupId::Depth,
        FieldGroupId::Bearing,
    ];
    /// Short name of the group as used in configuration and diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            FieldGroupId::Position => "pos",
            FieldGroupId::Velocity => "vel",
            FieldGroupId::AccelerometerBias => "acb",
            FieldGroupId::GyroscopeBias => "gyb",
            FieldGroupId::Attitude => "att",
            FieldGroupId::ExtrinsicTranslation => "vep",
            FieldGroupId::ExtrinsicRotation => "vea",
            FieldGroupId::Depth => "dep",
            FieldGroupId::Bearing => "nor",
        }
    }
    const fn index(self) -> usize {
        self as usize
    }
}

/// A single stochastic field, with its camera or landmark slot index where applicable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Position,
    Velocity,
    AccelerometerBias,
    GyroscopeBias,
    Attitude,
    ExtrinsicTranslation(usize),
    ExtrinsicRotation(usize),
    Depth(usize),
    Bearing(usize),
}
impl Field {
    pub fn group(&self) -> FieldGroupId {
        match self {
            Field::Position => FieldGroupId::Position,
            Field::Velocity => FieldGroupId::Velocity,
            Field::AccelerometerBias => FieldGroupId::AccelerometerBias,
            Field::GyroscopeBias => FieldGroupId::GyroscopeBias,
            Field::Attitude => FieldGroupId::Attitude,
            Field::ExtrinsicTranslation(_) => FieldGroupId::ExtrinsicTranslation,
            Field::ExtrinsicRotation(_) => FieldGroupId::ExtrinsicRotation,
            Field::Depth(_) => FieldGroupId::Depth,
            Field::Bearing(_) => FieldGroupId::Bearing,
        }
    }
    /// Element index within the group.
    pub fn element(&self) -> usize {
        match self {
            Field::ExtrinsicTranslation(i)
            | Field::ExtrinsicRotation(i)
            | Field::Depth(i)
            | Field::Bearing(i) => *i,
            _ => 0,
        }
    }
}
impl Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::ExtrinsicTranslation(i)
            | Field::ExtrinsicRotation(i)
            | Field::Depth(i)
            | Field::Bearing(i) => write!(f, "{}_{}", self.group().name(), i),
            _ => write!(f, "{}", self.group().name()),
        }
    }
}

/// Group descriptor with its configuration-time offset into the covariance index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldGroup {
    pub id: FieldGroupId,
    pub kind: FieldKind,
    pub count: usize,
    pub offset: usize,
}
impl FieldGroup {
    /// Total number of covariance rows owned by the group.
    pub fn dimension(&self) -> usize {
        self.kind.tangent_dim() * self.count
    }
}

/// Appends field groups in covariance order and assigns their offsets.
#[derive(Clone, Debug, Default)]
pub struct LayoutBuilder {
    groups: Vec<FieldGroup>,
    next_offset: usize,
}
impl LayoutBuilder {
    pub fn new() -> LayoutBuilder {
        LayoutBuilder::default()
    }
    pub fn group(mut self, id: FieldGroupId, kind: FieldKind, count: usize) -> LayoutBuilder {
        assert_eq!(
            id.index(),
            self.groups.len(),
            "field groups must be added in covariance order"
        );
        let group = FieldGroup {
            id,
            kind,
            count,
            offset: self.next_offset,
        };
        self.next_offset += group.dimension();
        self.groups.push(group);
        self
    }
    pub fn build(self, n_max: usize, n_cam: usize) -> StateLayout {
        assert_eq!(
            self.groups.len(),
            FieldGroupId::ALL.len(),
            "every field group must be present in the layout"
        );
        StateLayout {
            groups: self.groups,
            dimension: self.next_offset,
            n_max,
            n_cam,
        }
    }
}

/// Fixed covariance index layout for `n_max` landmark slots and `n_cam` cameras.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateLayout {
    groups: Vec<FieldGroup>,
    dimension: usize,
    n_max: usize,
    n_cam: usize,
}
impl StateLayout {
    /// Layout of the stochastic filter state.
    pub fn new(n_max: usize, n_cam: usize) -> StateLayout {
        LayoutBuilder::new()
            .group(FieldGroupId::Position, FieldKind::Vector3, 1)
            .group(FieldGroupId::Velocity, FieldKind::Vector3, 1)
            .group(FieldGroupId::AccelerometerBias, FieldKind::Vector3, 1)
            .group(FieldGroupId::GyroscopeBias, FieldKind::Vector3, 1)
            .group(FieldGroupId::Attitude, FieldKind::Quaternion, 1)
            .group(FieldGroupId::ExtrinsicTranslation, FieldKind::Vector3, n_cam)
            .group(FieldGroupId::ExtrinsicRotation, FieldKind::Quaternion, n_cam)
            .group(FieldGroupId::Depth, FieldKind::Scalar, n_max)
            .group(FieldGroupId::Bearing, FieldKind::Bearing, n_max)
            .build(n_max, n_cam)
    }
    /// Layout of the prediction noise. Same block structure as [StateLayout::new], but every
    /// block is Euclidean because noise lives in the tangent space.
    pub fn prediction_noise(n_max: usize, n_cam: usize) -> StateLayout {
        LayoutBuilder::new()
            .group(FieldGroupId::Position, FieldKind::Vector3, 1)
            .group(FieldGroupId::Velocity, FieldKind::Vector3, 1)
            .group(FieldGroupId::AccelerometerBias, FieldKind::Vector3, 1)
            .group(FieldGroupId::GyroscopeBias, FieldKind::Vector3, 1)
            .group(FieldGroupId::Attitude, FieldKind::Vector3, 1)
            .group(FieldGroupId::ExtrinsicTranslation, FieldKind::Vector3, n_cam)
            .group(FieldGroupId::ExtrinsicRotation, FieldKind::Vector3, n_cam)
            .group(FieldGroupId::Depth, FieldKind::Scalar, n_max)
            .group(FieldGroupId::Bearing, FieldKind::Vector2, n_max)
            .build(n_max, n_cam)
    }
    /// Total tangent dimension D; the covariance is D×D.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
    pub fn n_max(&self) -> usize {
        self.n_max
    }
    pub fn n_cam(&self) -> usize {
        self.n_cam
    }
    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }
    pub fn group(&self, id: FieldGroupId) -> &FieldGroup {
        &self.groups[id.index()]
    }
    /// First covariance index of `field`.
    ///
    /// # Panics
    /// If the camera or landmark index is outside the configured capacity.
    pub fn offset(&self, field: Field) -> usize {
        let group = self.group(field.group());
        let element = field.element();
        assert!(
            element < group.count,
            "{} out of range: group '{}' holds {} elements",
            field,
            group.id.name(),
            group.count
        );
        group.offset + element * group.kind.tangent_dim()
    }
    pub fn tangent_dim(&self, field: Field) -> usize {
        self.group(field.group()).kind.tangent_dim()
    }
    /// Covariance index range of `field`.
    pub fn range(&self, field: Field) -> Range<usize> {
        let start = self.offset(field);
        start..start + self.tangent_dim(field)
    }
    /// Covariance indices of the depth parameter and bearing of landmark slot `i`.
    pub fn feature_indices(&self, i: usize) -> (usize, usize) {
        (self.offset(Field::Depth(i)), self.offset(Field::Bearing(i)))
    }
    /// Every field of the layout in covariance order.
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.groups.iter().flat_map(|group| {
            (0..group.count).map(move |i| match group.id {
                FieldGroupId::Position => Field::Position,
                FieldGroupId::Velocity => Field::Velocity,
                FieldGroupId::AccelerometerBias => Field::AccelerometerBias,
                FieldGroupId::GyroscopeBias => Field::GyroscopeBias,
                FieldGroupId::Attitude => Field::Attitude,
                FieldGroupId::ExtrinsicTranslation => Field::ExtrinsicTranslation(i),
                FieldGroupId::ExtrinsicRotation => Field::ExtrinsicRotation(i),
                FieldGroupId::Depth => Field::Depth(i),
                FieldGroupId::Bearing => Field::Bearing(i),
            })
        })
    }
}
