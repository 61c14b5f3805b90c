use candle_core::Device;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jointtag_core::{Batch, InferenceModel, Objective, ParamMode, ParamStore, Tagger, TaggerConfig, TrainingModel};

fn bench_config() -> TaggerConfig {
    TaggerConfig {
        word_embedding_size: 64,
        pos_embedding_size: 32,
        encoder_size: 64,
        pos_decoder_size: 64,
        chunk_decoder_size: 64,
        ..TaggerConfig::default()
    }
    .with_shape(8, 20)
    .with_vocab(1_000, 45, 23)
}

fn bench_batch(config: &TaggerConfig) -> Batch {
    let rows = config.tokens_per_batch() as u32;
    let tokens: Vec<u32> = (0..rows).map(|i| (i * 37) % config.vocab_size as u32).collect();
    let pos: Vec<u32> = (0..rows).map(|i| i % config.num_pos_tags as u32).collect();
    let chunk: Vec<u32> = (0..rows).map(|i| i % config.num_chunk_tags as u32).collect();
    Batch::from_ids(config, &tokens, &pos, &chunk, &Device::Cpu).unwrap()
}

fn bench_tagger(c: &mut Criterion) {
    let config = bench_config();
    let batch = bench_batch(&config);
    let store = ParamStore::new(config.seed, &Device::Cpu);
    let mut train = TrainingModel::new(&config, &store, ParamMode::Create).unwrap();
    let eval = InferenceModel::new(&config, &store, ParamMode::Reuse).unwrap();

    c.bench_function("forward_8x20", |b| {
        b.iter(|| eval.forward(black_box(&batch)).unwrap());
    });

    c.bench_function("joint_step_8x20", |b| {
        b.iter(|| train.run(Objective::Joint, black_box(&batch)).unwrap());
    });
}

criterion_group!(benches, bench_tagger);
criterion_main!(benches);
