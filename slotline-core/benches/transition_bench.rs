use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::{TimeZone, Utc};
use slotline_core::lifecycle::{LifecycleEngine, Transition};
use slotline_core::network::partition_doctors;
use slotline_core::types::*;

// ─── Helpers ────────────────────────────────────────────────────────────────

fn make_doctor(i: usize) -> Doctor {
    Doctor {
        id: format!("doctor_{}", i),
        name: format!("Dr. {}", i),
        specialty: None,
    }
}

fn make_appointment(i: usize, doctor: Option<String>) -> Appointment {
    Appointment {
        id: format!("appt_{}", i),
        clinic_id: "clinic_1".to_string(),
        patient_id: format!("patient_{}", i),
        status: if doctor.is_some() {
            AppointmentStatus::Booked
        } else {
            AppointmentStatus::Open
        },
        doctor_id: doctor,
        date: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
        notes: None,
    }
}

// ─── Benchmarks ─────────────────────────────────────────────────────────────

fn bench_next_status(c: &mut Criterion) {
    c.bench_function("lifecycle_next_status", |b| {
        b.iter(|| {
            LifecycleEngine::next_status(
                black_box(AppointmentStatus::Open),
                black_box(Transition::Claim),
            )
        })
    });
}

fn bench_plan(c: &mut Criterion) {
    c.bench_function("lifecycle_plan_release", |b| {
        b.iter(|| LifecycleEngine::plan(black_box(Transition::Release), black_box("doctor_1"), None))
    });
}

fn bench_validate_new(c: &mut Criterion) {
    let request = NewAppointment {
        clinic_id: "clinic_1".to_string(),
        patient_id: "patient_1".to_string(),
        date: "2024-06-01T10:00:00+02:00".to_string(),
        notes: Some("  follow-up  ".to_string()),
    };

    c.bench_function("lifecycle_validate_new", |b| {
        b.iter(|| LifecycleEngine::validate_new(black_box(&request)))
    });
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("network_partition");

    for count in [10, 100, 1000] {
        let doctors: Vec<Doctor> = (0..count).map(make_doctor).collect();
        let appointments: Vec<Appointment> = (0..count)
            .map(|i| make_appointment(i, (i % 3 == 0).then(|| format!("doctor_{}", i))))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                partition_doctors(
                    black_box("clinic_1"),
                    black_box(doctors.clone()),
                    black_box(&appointments),
                )
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_next_status,
    bench_plan,
    bench_validate_new,
    bench_partition,
);
criterion_main!(benches);
