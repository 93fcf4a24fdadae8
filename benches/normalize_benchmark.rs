use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use seerprep::code_tables::CodeTables;
use seerprep::grade::{reconcile_grade, GradeInputs};
use seerprep::prelude::*;
use seerprep::schema::RawExtractSchema;
use seerprep::site::{primary_type, resolve_site_code};
use seerprep::stage::{reconcile_stage, StageInputs};

fn raw_line(patient_id: u64, year: i32) -> String {
    let mut fields = vec![String::new(); RawExtractSchema::column_count()];
    let values = [
        (RawField::PatientId, patient_id.to_string()),
        (RawField::RecordNumber, "1".to_string()),
        (RawField::AgeBin, "65-69 years".to_string()),
        (RawField::DiagnosisYear, year.to_string()),
        (RawField::DeathYear, "Alive at last contact".to_string()),
        (RawField::CancerType, "Lung and Bronchus".to_string()),
        (RawField::Behavior, "Malignant".to_string()),
        (RawField::BrainMet, "No".to_string()),
        (RawField::TAjcc6th, "Blank(s)".to_string()),
        (RawField::NAjcc6th, "Blank(s)".to_string()),
        (RawField::TAjcc7th, "Blank(s)".to_string()),
        (RawField::NAjcc7th, "Blank(s)".to_string()),
        (RawField::TSeerCombined, "p2".to_string()),
        (RawField::NSeerCombined, "c1".to_string()),
        (RawField::TEod, "Blank(s)".to_string()),
        (RawField::NEod, "Blank(s)".to_string()),
        (RawField::GAjcc6th, "Blank(s)".to_string()),
        (RawField::GAjcc7th, "Blank(s)".to_string()),
        (RawField::GSeerCombined, "Blank(s)".to_string()),
        (RawField::GEod, "Blank(s)".to_string()),
        (RawField::TotalMalignant, "2".to_string()),
        (RawField::TotalBenign, "0".to_string()),
        (RawField::HistologyType, "8140".to_string()),
        (RawField::NodesExamined, "10".to_string()),
        (RawField::NodesPositive, "01".to_string()),
        (RawField::GradeRecode, "Unknown".to_string()),
        (RawField::GradeClinical, "Blank(s)".to_string()),
        (RawField::GradePathological, "2".to_string()),
        (RawField::PrimarySiteCode, "343".to_string()),
        (RawField::HistologyCategory, "8140-8389: adenomas and adenocarcinomas".to_string()),
        (RawField::Psa, "Blank(s)".to_string()),
        (RawField::BoneMet, "No".to_string()),
        (RawField::LiverMet, "No".to_string()),
        (RawField::LungMet, "No".to_string()),
        (RawField::DistantLnMet, "None; no lymph node metastases".to_string()),
        (RawField::BreastSubtype, "Blank(s)".to_string()),
        (RawField::FollowupYear, "2021".to_string()),
        (RawField::OtherMet, "None; no other metastases".to_string()),
    ];
    for (field, value) in values {
        fields[field.index()] = value;
    }
    fields.join("\t")
}

fn benchmark_field_normalizer(c: &mut Criterion) {
    let tables = CodeTables::standard().expect("standard code tables");

    c.bench_function("reconcile_t_stage_seer_combined", |b| {
        let inputs = StageInputs::new("Blank(s)", "Blank(s)", "p2", "Blank(s)");
        b.iter(|| reconcile_stage(&tables.t_stage, black_box(&inputs)))
    });

    c.bench_function("reconcile_grade_naaccr", |b| {
        let inputs = GradeInputs {
            pathological: "S",
            clinical: "Blank(s)",
            recode: "Unknown",
            cancer_type: "Corpus Uteri",
        };
        b.iter(|| reconcile_grade(&tables, black_box(&inputs)))
    });

    let mut group = c.benchmark_group("site_resolution");
    for code in [34u16, 504, 619, 12] {
        group.bench_with_input(BenchmarkId::from_parameter(code), &code, |b, &code| {
            b.iter(|| resolve_site_code(&tables, black_box(code)))
        });
    }
    group.bench_function("primary_type_range_hit", |b| {
        b.iter(|| primary_type(&tables, black_box(343), "Lung and Bronchus"))
    });
    group.finish();
}

fn benchmark_record_builder(c: &mut Criterion) {
    let builder = RecordBuilder::standard().expect("standard code tables");
    let line = raw_line(1030, 2015);

    c.bench_function("build_record", |b| {
        b.iter(|| builder.build_line(black_box(&line)).expect("valid line"))
    });
}

fn benchmark_aggregation(c: &mut Criterion) {
    let builder = RecordBuilder::standard().expect("standard code tables");
    let records: Vec<CanonicalRecord> = (0..1_000u64)
        .flat_map(|pid| (0..3).map(move |i| (pid, 2008 + i)))
        .map(|(pid, year)| builder.build_line(&raw_line(pid, year)).expect("valid line"))
        .collect();

    let mut group = c.benchmark_group("aggregation");
    group.sample_size(20);
    group.bench_function("aggregate_3000_records", |b| {
        b.iter(|| {
            let patients = PatientAggregator::new().aggregate(black_box(records.clone()));
            patients.iter().map(|p| p.summary()).count()
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_field_normalizer,
    benchmark_record_builder,
    benchmark_aggregation
);
criterion_main!(benches);
