use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use htk_io::data::alignment::map_labels;
use htk_io::data::loader;
use htk_io::format::{
    write_label_map, AlignmentFormat, ByteOrder, ElementType, QuestionDialect, TreeFormat,
    VecSeqFormat, TICKS_PER_SECOND,
};
use htk_io::{
    leaf_macro_index, AlignedSegment, DecisionTree, LabelMap, LeafNode, Node, Question,
    QuestionSet, Segment, StreamSpec, TreeFile, VectorSequence,
};

const FRAME_PERIOD: f64 = 0.005;
const DIMENSION: usize = 4;

/// Full-context labels and their durations in frames.
const UTTERANCE: [(&str, i64); 5] = [
    ("sil^sil-sil+a=t", 10),
    ("sil^sil-a+t=e", 8),
    ("sil^a-t+e=sil", 6),
    ("a^t-e+sil=sil", 12),
    ("t^e-sil+sil=sil", 10),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

#[derive(Serialize)]
struct Manifest {
    utterance: &'static str,
    questions: String,
    trees: String,
    labels: String,
    leaf_alignment: String,
    leaf_index: String,
    parameters: String,
    parameter_format: VecSeqFormat,
    alignment_format: AlignmentFormat,
    frames: usize,
}

fn questions() -> Result<QuestionSet> {
    let questions = vec![
        Question::new("C-sil", ["*-sil+*"])?,
        Question::new("C-a", ["*-a+*"])?,
        Question::new("R-t", ["*+t=*"])?,
        Question::new("L-Vowel", ["a^*", "e^*"])?,
    ];
    Ok(QuestionSet::try_from(questions)?)
}

fn trees() -> Result<Vec<DecisionTree>> {
    let mgc = DecisionTree::from_root(
        StreamSpec::new("{*}[2]")?,
        Node::split(
            "C-sil",
            Node::split(
                "C-a",
                Node::split("R-t", Node::leaf("mgc_s2_2"), Node::leaf("mgc_s2_3")),
                Node::leaf("mgc_s2_4"),
            ),
            Node::leaf("mgc_s2_1"),
        ),
    )?;
    let dur = DecisionTree::leaf(StreamSpec::new("dur")?, LeafNode::macro_id("dur_s2_1"))?;
    Ok(vec![mgc, dur])
}

fn parameters(frames: usize, rng: &mut SimpleRng) -> Result<VectorSequence> {
    let mut seq = VectorSequence::new(DIMENSION)?;
    for t in 0..frames {
        let frame: Vec<f64> = (0..DIMENSION)
            .map(|c| (t as f64 * 0.1 * (c + 1) as f64).sin() / (c + 1) as f64 + rng.gauss(0.0, 0.01))
            .collect();
        seq.push_frame(&frame)?;
    }
    Ok(seq)
}

fn name_in(dir: &Path, file: &str) -> (PathBuf, String) {
    (dir.join(file), file.to_string())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "sample_data".into()));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let questions = questions()?;
    let tree_file = TreeFile {
        questions: questions.clone(),
        trees: trees()?,
    };
    tree_file.validate()?;

    // Label file in ticks, and the same utterance as a frame alignment.
    let ticks_per_frame = (FRAME_PERIOD * TICKS_PER_SECOND).round() as i64;
    let mut segments = Vec::new();
    let mut alignment = Vec::new();
    let mut start = 0;
    for (label, duration) in UTTERANCE {
        let end = start + duration;
        segments.push(Segment::timed(start * ticks_per_frame, end * ticks_per_frame, label));
        alignment.push(AlignedSegment::new(start, end, label));
        start = end;
    }

    let mgc = tree_file
        .tree("{*}[2]")
        .context("sample tree file has no {*}[2] tree")?;
    let mut leaf_of_label = LabelMap::new();
    for (label, _) in UTTERANCE {
        let leaf = mgc.find_leaf(label, &questions)?;
        let id = leaf
            .macro_id
            .clone()
            .with_context(|| format!("leaf for {label} has no macro id"))?;
        leaf_of_label.insert(label.to_string(), id);
    }
    let leaf_alignment = map_labels(&alignment, &leaf_of_label)?;
    let leaf_index = leaf_macro_index(&tree_file.trees);

    let frames = start as usize;
    let mut rng = SimpleRng::new(42);
    let params = parameters(frames, &mut rng)?;
    let param_format = VecSeqFormat::new(DIMENSION)
        .with_element(ElementType::F32)
        .with_byte_order(ByteOrder::Little);
    let alignment_format = AlignmentFormat::new(FRAME_PERIOD);

    let (ques_path, ques_name) = name_in(&out_dir, "questions.hed");
    loader::write_questions_file(&ques_path, &questions, QuestionDialect::QuestionFile)?;

    let (tree_path, tree_name) = name_in(&out_dir, "trees.inf");
    loader::write_tree_file(&tree_path, &tree_file, &TreeFormat::default())?;

    let (lab_path, lab_name) = name_in(&out_dir, "sample.lab");
    loader::write_segments_file(&lab_path, &segments)?;

    let (leaf_path, leaf_name) = name_in(&out_dir, "sample.leaf.lab");
    loader::write_alignment_file(&leaf_path, &leaf_alignment, &alignment_format)?;

    let (index_path, index_name) = name_in(&out_dir, "leaf_index.map");
    let index_text = write_label_map(leaf_index.iter().map(|(id, i)| (id.as_str(), i.to_string())));
    std::fs::write(&index_path, index_text)
        .with_context(|| format!("writing {}", index_path.display()))?;

    let (param_path, param_name) = name_in(&out_dir, "sample.mgc");
    loader::write_vectors_file(&param_path, &params, param_format.element, param_format.byte_order)?;

    let manifest = Manifest {
        utterance: "sample",
        questions: ques_name,
        trees: tree_name,
        labels: lab_name,
        leaf_alignment: leaf_name,
        leaf_index: index_name,
        parameters: param_name,
        parameter_format: param_format,
        alignment_format,
        frames,
    };
    let manifest_path = out_dir.join("manifest.json");
    let json = serde_json::to_string_pretty(&manifest).context("serialising manifest")?;
    std::fs::write(&manifest_path, json)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    log::info!("sample utterance has {} frames", frames);
    println!(
        "Wrote {} questions, {} trees and {} frames of dimension {DIMENSION} to {}",
        questions.len(),
        tree_file.trees.len(),
        frames,
        out_dir.display()
    );
    Ok(())
}
