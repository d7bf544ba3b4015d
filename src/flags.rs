//! Fill flags: which quantities an element cache computes and stores.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

macro_rules! fill_flags {
    ($(#[$meta:meta])* $name:ident { $($(#[$flag_meta:meta])* $flag:ident = $bit:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub struct $name(u16);

        impl $name {
            pub const NONE: Self = Self(0);
            $(
                $(#[$flag_meta])*
                pub const $flag: Self = Self(1 << $bit);
            )*

            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let names: Vec<&str> = [$((Self::$flag, stringify!($flag))),*]
                    .iter()
                    .filter(|(flag, _)| self.contains(*flag))
                    .map(|(_, name)| *name)
                    .collect();
                write!(f, "{}({})", stringify!($name), names.join(" | "))
            }
        }
    };
}

fill_flags! {
    /// Quantities computed by a grid element handler.
    GridFlags {
        /// Quadrature points in parametric coordinates.
        POINT = 0,
        /// Quadrature weights on the reference cell.
        WEIGHT = 1,
        /// Parametric measure of the (sub-)element.
        MEASURE = 2,
        /// Quadrature weights times parametric measure.
        W_MEASURE = 3,
        /// Per-direction side lengths.
        LENGTH = 4,
    }
}

fill_flags! {
    /// Quantities computed by a space (basis) element handler.
    BasisFlags {
        VALUE = 0,
        GRADIENT = 1,
        HESSIAN = 2,
        /// Per-direction univariate tables at the tensor quadrature, used by sum factorization.
        UNIVARIATE = 3,
        POINT = 4,
        W_MEASURE = 5,
    }
}

fill_flags! {
    /// Quantities computed by a mapping element handler.
    MappingFlags {
        POINT = 0,
        JACOBIAN = 1,
        HESSIAN = 2,
        MEASURE = 3,
        W_MEASURE = 4,
        /// `J (J^T J)^{-1}`, the transpose of the pseudo-inverse used to push gradients forward.
        INVERSE_JACOBIAN_TRANSPOSE = 5,
        /// Unit outward (co)normal on the faces of the element.
        OUTER_NORMAL = 6,
    }
}

fill_flags! {
    /// Quantities computed by a function element handler.
    FunctionFlags {
        VALUE = 0,
        GRADIENT = 1,
        HESSIAN = 2,
    }
}

impl BasisFlags {
    /// Grid quantities needed to provide these basis quantities.
    pub fn grid_flags(self) -> GridFlags {
        let mut flags = GridFlags::POINT | GridFlags::LENGTH;
        if self.contains(BasisFlags::W_MEASURE) {
            flags |= GridFlags::W_MEASURE;
        }
        flags
    }
}

impl MappingFlags {
    /// Whether any of the requested quantities is derived from the Jacobian.
    pub fn needs_jacobian(self) -> bool {
        self.intersects(
            MappingFlags::JACOBIAN
                | MappingFlags::MEASURE
                | MappingFlags::W_MEASURE
                | MappingFlags::INVERSE_JACOBIAN_TRANSPOSE
                | MappingFlags::OUTER_NORMAL,
        )
    }

    /// Whether inverse Jacobians are computed, either requested or for the normals.
    pub fn needs_inverse_jacobian(self) -> bool {
        self.intersects(MappingFlags::INVERSE_JACOBIAN_TRANSPOSE | MappingFlags::OUTER_NORMAL)
    }

    /// Basis quantities needed to provide these mapping quantities.
    pub fn basis_flags(self) -> BasisFlags {
        let mut flags = BasisFlags::NONE;
        if self.contains(MappingFlags::POINT) {
            flags |= BasisFlags::VALUE;
        }
        if self.needs_jacobian() {
            flags |= BasisFlags::GRADIENT;
        }
        if self.contains(MappingFlags::HESSIAN) {
            flags |= BasisFlags::HESSIAN;
        }
        if self.contains(MappingFlags::W_MEASURE) {
            flags |= BasisFlags::W_MEASURE;
        }
        flags
    }
}

impl FunctionFlags {
    pub fn basis_flags(self) -> BasisFlags {
        let mut flags = BasisFlags::NONE;
        if self.contains(FunctionFlags::VALUE) {
            flags |= BasisFlags::VALUE;
        }
        if self.contains(FunctionFlags::GRADIENT) {
            flags |= BasisFlags::GRADIENT;
        }
        if self.contains(FunctionFlags::HESSIAN) {
            flags |= BasisFlags::HESSIAN;
        }
        flags
    }
}
