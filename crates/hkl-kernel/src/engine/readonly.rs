//! Beam angles with respect to the sample surface.

use crate::error::Result;
use crate::kinematics::Kinematics;
use crate::mode::Mode;

pub(super) fn incidence(kin: &Kinematics, mode: &Mode) -> Result<f64> {
    Ok(kin.incidence(&mode.surface()?))
}

pub(super) fn emergence(kin: &Kinematics, mode: &Mode) -> Result<f64> {
    Ok(kin.emergence(&mode.surface()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;
    use crate::geometry::GeometryBuilder;
    use crate::mode::surface_parameters;
    use crate::sample::Sample;
    use approx::assert_relative_eq;
    use hkl_math::Vec3;

    fn surface_mode(n: Vec3) -> Mode {
        surface_parameters(&n)
            .into_iter()
            .fold(Mode::new("incidence", &["omega", "chi", "phi"]), Mode::with_parameter)
    }

    #[test]
    fn test_incidence_emergence() {
        let mut g = GeometryBuilder::new("E4CV")
            .holder(&[("omega", -Vec3::y()), ("chi", Vec3::x()), ("phi", -Vec3::y())])
            .holder(&[("tth", -Vec3::y())])
            .build()
            .unwrap();
        g.set_axis_values_in_user_unit(&[30.0, 0.0, 0.0, 60.0]).unwrap();
        let detector = Detector::default();
        let sample = Sample::default();
        let kin = Kinematics::new(&g, &detector, &sample);

        let mode = surface_mode(Vec3::z());
        assert_relative_eq!(incidence(&kin, &mode).unwrap(), 30f64.to_radians(), epsilon = 1e-9);
        assert_relative_eq!(emergence(&kin, &mode).unwrap(), 30f64.to_radians(), epsilon = 1e-9);

        let mode = surface_mode(Vec3::zeros());
        assert!(incidence(&kin, &mode).is_err());
    }
}
