pub fn numel(shape: &[usize]) -> usize {
    shape.iter().copied().product::<usize>()
}

pub fn format_shape(shape: &[usize]) -> String {
    let dims = shape
        .iter()
        .map(|dim| dim.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("[{}]", dims)
}
