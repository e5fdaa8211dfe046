//! Tests for the latitude-banded split

use geo::coord;
use geosplit::synthetic::SyntheticScenario;
use geosplit::{BandSplitter, BandZone, Observation, SplitConfig, SplitError};

fn at(id: u64, latitude: f64, longitude: f64) -> Observation {
    Observation::new(id, 0.0, 0.0, "a").with_location(latitude, longitude)
}

fn splitter() -> BandSplitter {
    BandSplitter::new(1.0, 0.012, 0.008).unwrap()
}

#[test]
fn test_buffer_narrower_than_cell_diagonal() {
    // 0.008 deg cell has a diagonal of ~0.0113 deg
    let result = BandSplitter::new(1.0, 0.011, 0.008);
    assert!(matches!(
        result,
        Err(SplitError::GeometryInconsistency { band: None, .. })
    ));
    assert!(BandSplitter::new(1.0, 0.0114, 0.008).is_ok());
}

#[test]
fn test_band_narrower_than_two_buffers() {
    let result = BandSplitter::new(0.02, 0.012, 0.008);
    assert!(matches!(
        result,
        Err(SplitError::Configuration {
            field: "band_width_deg",
            ..
        })
    ));
}

#[test]
fn test_bands_for_range() {
    let bands = splitter().bands_for_range(44.0, 46.5);
    assert_eq!(bands.len(), 3);

    assert_eq!(bands[0].lat_low, 44.0);
    assert_eq!(bands[0].lat_high, 45.0);
    assert!((bands[0].exclusion_low - 44.012).abs() < 1e-12);
    assert!((bands[0].exclusion_high - 44.988).abs() < 1e-12);
    assert_eq!(bands[2].lat_low, 46.0);
}

#[test]
fn test_band_zones() {
    let observations = vec![
        at(1, 44.5, -85.0),
        at(2, 44.995, -84.9),
        at(3, 45.5, -84.8),
        at(4, 45.001, -84.7),
    ];
    let regions = splitter()
        .with_lat_range(Some((44.0, 46.0)))
        .band_regions(&observations);
    assert_eq!(regions.len(), 2);

    let zone = |band: usize, o: &Observation| {
        regions[band].zone(coord! { x: o.longitude, y: o.latitude })
    };
    assert_eq!(zone(0, &observations[0]), BandZone::Test);
    assert_eq!(zone(0, &observations[1]), BandZone::Buffer);
    assert_eq!(zone(0, &observations[2]), BandZone::Train);
    assert_eq!(zone(1, &observations[0]), BandZone::Train);
    assert_eq!(zone(1, &observations[3]), BandZone::Buffer);
    assert_eq!(zone(1, &observations[2]), BandZone::Test);
}

#[test]
fn test_split_membership() {
    let observations = vec![
        at(1, 44.5, -85.0),
        at(2, 44.995, -84.9),
        at(3, 45.5, -84.8),
        at(4, 45.001, -84.7),
    ];
    let split = splitter()
        .with_lat_range(Some((44.0, 46.0)))
        .split(&observations)
        .unwrap();

    assert_eq!(split.bands.len(), 2);
    assert_eq!(split.membership.len(), 4);

    // Band 0: row 0 test, row 1 buffered, rows 2 and 3 train
    let band0: Vec<(bool, bool)> = split
        .membership
        .iter()
        .map(|m| (m[0].train, m[0].test))
        .collect();
    assert_eq!(
        band0,
        vec![(false, true), (false, false), (true, false), (true, false)]
    );

    for row in &split.membership {
        for m in row {
            assert!(!(m.train && m.test));
        }
    }

    assert_eq!(split.reports[0].train_count, 2);
    assert_eq!(split.reports[0].test_count, 1);
    assert!(split.reports[0].min_separation_deg.unwrap() >= 0.012);
}

#[test]
fn test_single_parallel_gets_one_band() {
    let observations = vec![at(1, 44.0, -85.0), at(2, 44.0, -84.0)];
    let split = splitter().split(&observations).unwrap();
    assert_eq!(split.bands.len(), 1);
    assert_eq!(split.reports[0].test_count, 0);
    assert_eq!(split.reports[0].min_separation_deg, None);
}

#[test]
fn test_empty_input() {
    let split = splitter().split(&[]).unwrap();
    assert!(split.bands.is_empty());
    assert!(split.membership.is_empty());
}

#[test]
fn test_buffer_invariant_on_synthetic_data() {
    let observations = SyntheticScenario {
        site_count: 25,
        observations_per_site: 20,
        site_spacing_meters: 20_000.0,
        site_spread_meters: 2_000.0,
        seed: 3,
        ..SyntheticScenario::default()
    }
    .generate()
    .observations;

    let config = SplitConfig {
        band_width_deg: 0.2,
        ..SplitConfig::default()
    };
    let splitter = BandSplitter::from_config(&config).unwrap();
    let split = splitter.split(&observations).unwrap();
    assert!(split.bands.len() > 1);

    for band in 0..split.bands.len() {
        let (mut train, mut test) = (Vec::new(), Vec::new());
        for (row, obs) in observations.iter().enumerate() {
            let m = split.membership[row][band];
            if m.train {
                train.push(obs);
            }
            if m.test {
                test.push(obs);
            }
        }
        for a in &test {
            for b in &train {
                let d = ((a.latitude - b.latitude).powi(2) + (a.longitude - b.longitude).powi(2))
                    .sqrt();
                assert!(d >= config.band_buffer_deg - 1e-9, "band {band}: {d} deg");
            }
        }
    }
}

#[test]
fn test_verify_reports_min_separation() {
    let splitter = splitter();
    let band = splitter.bands_for_range(44.0, 45.0)[0];
    let train = [[-85.0, 44.005], [-85.0, 44.995]];
    let test = [[-85.0, 44.02], [-85.0, 44.5]];

    let report = splitter.verify(&band, &train, &test).unwrap();
    assert_eq!(report.train_count, 2);
    assert_eq!(report.test_count, 2);
    let separation = report.min_separation_deg.unwrap();
    assert!((separation - 0.015).abs() < 1e-9);
}

#[test]
fn test_verify_rejects_test_inside_buffer() {
    let splitter = splitter();
    let band = splitter.bands_for_range(44.0, 45.0)[0];
    // 0.005 deg apart with a 0.012 deg buffer
    let train = [[-85.0, 44.005]];
    let test = [[-85.0, 44.01], [-85.0, 44.5]];

    let result = splitter.verify(&band, &train, &test);
    assert!(matches!(
        result,
        Err(SplitError::GeometryInconsistency { band: Some(0), .. })
    ));
}

#[test]
fn test_verify_without_test_points() {
    let splitter = splitter();
    let band = splitter.bands_for_range(44.0, 45.0)[0];
    let report = splitter.verify(&band, &[[-85.0, 44.005]], &[]).unwrap();
    assert_eq!(report.min_separation_deg, None);
}
