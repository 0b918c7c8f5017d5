//! Small linear algebra helpers shared by homography estimation and warping.

mod dmat3;

pub use dmat3::DMat3;
