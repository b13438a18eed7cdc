use super::vertex::Vertex;

/// Unit cube centred on the origin, four vertices per face so every face
/// gets a flat normal. Faces wind counter-clockwise seen from outside.
pub fn cube_mesh() -> (Vec<Vertex>, Vec<u32>) {
    // (normal, u axis, v axis) per face; u x v == normal keeps the winding CCW
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    const CORNERS: [(f32, f32); 4] = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in FACES {
        let base = vertices.len() as u32;
        for (cu, cv) in CORNERS {
            let position = [
                normal[0] * 0.5 + u[0] * cu + v[0] * cv,
                normal[1] * 0.5 + u[1] * cu + v[1] * cv,
                normal[2] * 0.5 + u[2] * cu + v[2] * cv,
            ];
            vertices.push(Vertex::new(position, normal, [cu + 0.5, 0.5 - cv]));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

/// Flat square in the XZ plane facing +Y, `size` units on a side.
pub fn plane_mesh(size: f32, uv_repeat: f32) -> (Vec<Vertex>, Vec<u32>) {
    let h = size * 0.5;
    let up = [0.0, 1.0, 0.0];
    let vertices = vec![
        Vertex::new([-h, 0.0, h], up, [0.0, uv_repeat]),
        Vertex::new([h, 0.0, h], up, [uv_repeat, uv_repeat]),
        Vertex::new([h, 0.0, -h], up, [uv_repeat, 0.0]),
        Vertex::new([-h, 0.0, -h], up, [0.0, 0.0]),
    ];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}
