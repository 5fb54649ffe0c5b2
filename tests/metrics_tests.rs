use comfort_autocontrol::{
    Bands, ComfortMetrics, DEFAULT_MASS_FLOW_KG_PER_S, DiBand, HeatIndexBand, LoadBand, PmvInput,
    PpdBand, Sample, cooling_load_index, cooling_power, discomfort_index, heat_index, pmv_ppd,
    ppd_from_pmv,
};

fn grid() -> impl Iterator<Item = (f64, f64)> {
    (10..=40).step_by(2).flat_map(|t| {
        (0..=100)
            .step_by(10)
            .map(move |rh| (t as f64, rh as f64))
    })
}

#[test]
fn discomfort_index_reference_values() {
    assert!((discomfort_index(30.0, 70.0) - 81.38).abs() < 0.01);
    assert!((discomfort_index(24.0, 50.0) - 70.47).abs() < 0.01);
}

#[test]
fn heat_index_never_below_air_temperature() {
    for (t, rh) in grid() {
        let hi = heat_index(t, rh);
        assert!(hi >= t, "HI({t}, {rh}) = {hi}");
    }
}

#[test]
fn heat_index_rises_in_humid_heat() {
    assert!(heat_index(32.0, 80.0) > 40.0);
}

#[test]
fn cooling_load_is_non_negative() {
    for (t, rh) in grid() {
        assert!(cooling_load_index(t, rh) >= 0.0);
    }
    assert_eq!(cooling_load_index(24.0, 50.0), 0.0);
    assert_eq!(cooling_load_index(18.0, 30.0), 0.0);
    assert!(cooling_load_index(30.0, 70.0) > 20.0);
}

#[test]
fn cooling_power_is_linear_in_load() {
    let cli = cooling_load_index(30.0, 70.0);
    let one = cooling_power(cli, DEFAULT_MASS_FLOW_KG_PER_S);
    let two = cooling_power(2.0 * cli, DEFAULT_MASS_FLOW_KG_PER_S);
    assert!((two - 2.0 * one).abs() < 1e-9);
    assert_eq!(cooling_power(cli, 0.0), 0.0);
}

#[test]
fn metrics_match_free_functions() {
    let sample = Sample::new(28.0, 65.0).unwrap();
    let m = ComfortMetrics::from_sample(&sample).unwrap();
    assert_eq!(m.di, discomfort_index(28.0, 65.0));
    assert_eq!(m.hi, heat_index(28.0, 65.0));
    assert_eq!(m.cli, cooling_load_index(28.0, 65.0));
    assert_eq!(m.cooling_power_kw, cooling_power(m.cli, DEFAULT_MASS_FLOW_KG_PER_S));
}

#[test]
fn di_band_edges() {
    let cases = [
        (64.9, DiBand::VeryComfortable),
        (65.0, DiBand::Comfortable),
        (69.9, DiBand::Comfortable),
        (70.0, DiBand::Caution),
        (74.9, DiBand::Caution),
        (75.0, DiBand::Uncomfortable),
        (79.9, DiBand::Uncomfortable),
        (80.0, DiBand::VeryUncomfortable),
        (100.0, DiBand::VeryUncomfortable),
    ];
    for (di, band) in cases {
        assert_eq!(DiBand::from_di(di), band, "DI {di}");
    }
}

#[test]
fn bands_for_hot_humid_room() {
    let m = ComfortMetrics::from_sample(&Sample::new(30.0, 70.0).unwrap()).unwrap();
    let bands = Bands::from_metrics(&m);
    assert_eq!(bands.di, DiBand::VeryUncomfortable);
    assert!(bands.di.triggers_auto_control());
    assert!(bands.hi >= HeatIndexBand::from_hi(30.0));
    assert_eq!(bands.cli, LoadBand::High);
}

#[test]
fn neutral_pmv_has_minimum_dissatisfaction() {
    assert!((ppd_from_pmv(0.0) - 5.0).abs() < 1e-9);
    assert_eq!(PpdBand::from_ppd(ppd_from_pmv(0.0)), PpdBand::from_ppd(5.0));
}

#[test]
fn pmv_rises_with_temperature() {
    let cool = pmv_ppd(&PmvInput::classroom(20.0, 50.0)).unwrap();
    let warm = pmv_ppd(&PmvInput::classroom(30.0, 50.0)).unwrap();
    assert!(warm.pmv > cool.pmv);
    for r in [cool, warm] {
        assert!((-3.0..=3.0).contains(&r.pmv));
        assert!((5.0..=100.0).contains(&r.ppd));
    }
}

#[test]
fn pmv_rejects_bad_input() {
    let mut input = PmvInput::classroom(24.0, 50.0);
    input.met = 0.0;
    assert!(pmv_ppd(&input).unwrap_err().is_invalid_input());
    input = PmvInput::classroom(f64::INFINITY, 50.0);
    assert!(pmv_ppd(&input).unwrap_err().is_invalid_input());
}

#[test]
fn invalid_sample_rejected_by_metrics() {
    let sample = Sample {
        temperature: 25.0,
        humidity: -1.0,
    };
    assert!(ComfortMetrics::from_sample(&sample).unwrap_err().is_invalid_input());
}
