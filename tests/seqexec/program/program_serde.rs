use anyhow::Result;
use seqexec::{
    AttrValue, DType, NaiveExecutor, OpDesc, Place, ProgramDeserialize, ProgramDesc,
    ProgramSerialize, Scope, VarDesc, VarType,
};
use serde_json::json;

use crate::common;

#[test]
fn json_roundtrip_preserves_program() -> Result<()> {
    let mut program = common::program(
        &["x", "y"],
        vec![
            common::fill_constant("x", &[2, 2], 0.5),
            common::scale("x", "y", 4.0),
        ],
    )?;
    program.add_var(
        0,
        VarDesc::tensor("w")
            .persistable()
            .with_dtype(DType::I64)
            .with_shape(vec![-1, 3]),
    )?;
    let sub = program.append_block(0)?;
    program.add_var(sub, VarDesc::of_type("arr", VarType::TensorArray))?;
    program.add_op(
        sub,
        OpDesc::new("relu")
            .with_input("X", &["x"])
            .with_output("Out", &["y"])
            .with_intermediate_output("XShape", &["@EMPTY@"]),
    )?;

    let json = ProgramSerialize::json(&program)?;
    let restored = ProgramDeserialize::from_json(json)?;
    assert_eq!(restored, program);

    let text = ProgramSerialize::json_string(&program)?;
    assert_eq!(ProgramDeserialize::from_str(&text)?, program);
    Ok(())
}

#[test]
fn handwritten_json_drives_prepare() -> Result<()> {
    let json = json!({
        "blocks": [{
            "idx": 0,
            "vars": [
                { "name": "x" },
                { "name": "y" },
                { "name": "w", "persistable": true }
            ],
            "ops": [
                { "type": "feed", "inputs": { "X": ["feed"] }, "outputs": { "Out": ["x"] } },
                {
                    "type": "fill_constant",
                    "outputs": { "Out": ["x"] },
                    "attrs": {
                        "shape": { "int_list": [3] },
                        "value": { "float": 2.0 },
                        "dtype": { "d_type": "f32" }
                    }
                },
                {
                    "type": "scale",
                    "inputs": { "X": ["x"] },
                    "outputs": { "Out": ["y"] },
                    "attrs": { "scale": { "float": 1.5 }, "bias": { "float": 1.0 } }
                },
                { "type": "fetch", "inputs": { "X": ["y"] }, "outputs": { "Out": ["fetch"] } }
            ]
        }]
    });
    let program = ProgramDeserialize::from_json(json)?;
    assert_eq!(program.num_blocks(), 1);
    assert_eq!(
        program.block(0)?.ops[1].attr("shape"),
        Some(&AttrValue::IntList(vec![3]))
    );

    let scope = Scope::new();
    let mut exec = NaiveExecutor::new(Place::Cpu);
    exec.create_variables(&program, 0, true, &scope)?;
    exec.create_variables(&program, 0, false, &scope)?;
    exec.prepare(Some(scope.clone()), &program, 0)?;
    assert_eq!(exec.ops().len(), 2);

    exec.run()?;
    assert_eq!(common::read_f32(&scope, "y")?, vec![4.0; 3]);
    assert!(scope.has_local_var("w"));
    Ok(())
}

#[test]
fn malformed_program_is_rejected() {
    assert!(ProgramDeserialize::from_str("{ \"blocks\": 3 }").is_err());
    assert!(ProgramDeserialize::from_json(json!({ "blocks": [{ "vars": [] }] })).is_err());
}

#[test]
fn append_block_checks_parent() {
    let mut program = ProgramDesc::new();
    assert!(program.append_block(4).is_err());
    assert_eq!(program.append_block(0).ok(), Some(1));
    assert_eq!(program.block(1).map(|block| block.parent_idx).ok(), Some(Some(0)));
}
