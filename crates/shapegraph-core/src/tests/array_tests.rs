use crate::{Cell, Graph, NodeFlags, Type};
use pretty_assertions::assert_eq;

#[test]
fn test_marking_array_folds_existing_fields() {
    let mut graph = Graph::new();
    let n = graph.create_node();
    graph.add_type(n, 6, Type::Int(8));

    graph.set_array(n, 4);
    graph.add_type(n, 2, Type::Int(16));

    assert_eq!(graph.node(n).types().count(), 1);
    let set = graph.get_type(n, 2).unwrap();
    assert_eq!(set, graph.get_type(n, 6).unwrap());
    assert!(graph.type_set_contains(set, &Type::Int(8)));
    assert!(graph.type_set_contains(set, &Type::Int(16)));
}

#[test]
fn test_array_offsets_wrap() {
    let mut graph = Graph::new();
    let n = graph.create_node();
    graph.set_array(n, 4);

    let node = graph.node(n);
    assert_eq!(node.stride(), Some(4));
    for offset in 0..32 {
        assert_eq!(node.adjust_offset(offset), node.adjust_offset(offset + 4));
    }
    assert_eq!(Cell::new(n, 9).get_offset(&graph), 1);
}

#[test]
fn test_zero_stride_is_treated_as_one() {
    let mut graph = Graph::new();
    let n = graph.create_node();
    graph.set_array(n, 0);

    assert_eq!(graph.node(n).stride(), Some(1));
    assert_eq!(graph.node(n).adjust_offset(5), 0);
}

#[test]
fn test_array_flag_uses_current_size() {
    let mut graph = Graph::new();
    let n = graph.create_node();
    graph.grow_size(n, 12);

    graph.set_attribute(n, NodeFlags::ARRAY, true);

    assert!(graph.is_array(n));
    assert_eq!(graph.node(n).stride(), Some(12));
}

#[test]
fn test_arrays_with_equal_stride_merge() {
    let mut graph = Graph::new();
    let a = graph.create_node();
    let b = graph.create_node();
    graph.set_array(a, 4);
    graph.set_array(b, 4);
    graph.add_type(a, 0, Type::Int(32));

    graph.unify(a, b);

    assert!(graph.is_array(b));
    assert!(!graph.is_collapsed(b));
    assert!(graph.has_type(b, 8));
}

#[test]
fn test_arrays_with_different_stride_collapse() {
    let mut graph = Graph::new();
    let a = graph.create_node();
    let b = graph.create_node();
    graph.set_array(a, 4);
    graph.set_array(b, 8);

    graph.unify(a, b);

    assert!(graph.is_collapsed(a));
    assert!(graph.is_collapsed(b));
}

#[test]
fn test_object_fitting_in_element_keeps_fields() {
    let mut graph = Graph::new();
    let arr = graph.create_node();
    let obj = graph.create_node();
    graph.set_array(arr, 8);
    graph.add_type(obj, 0, Type::Int(32));

    graph.unify_at(obj, arr, 20);

    assert!(!graph.is_collapsed(arr));
    assert!(graph.has_type(arr, 4));
    assert!(graph.has_type(arr, 12));
    assert_eq!(Cell::new(obj, 0).get_offset(&graph), 4);
}

#[test]
fn test_object_straddling_elements_collapses() {
    let mut graph = Graph::new();
    let arr = graph.create_node();
    let obj = graph.create_node();
    graph.set_array(arr, 8);
    graph.add_type(obj, 0, Type::Int(64));

    graph.unify_at(obj, arr, 4);

    assert!(graph.is_collapsed(arr));
}

#[test]
fn test_array_absorbing_small_object_spreads_stride() {
    let mut graph = Graph::new();
    let arr = graph.create_node();
    let obj = graph.create_node();
    graph.set_array(arr, 8);
    graph.add_type(obj, 0, Type::Int(32));

    graph.unify(arr, obj);

    assert!(graph.is_array(obj));
    assert_eq!(graph.node(obj).stride(), Some(8));
    assert!(graph.has_type(obj, 16));
}

#[test]
fn test_restriding_array_collapses() {
    let mut graph = Graph::new();
    let n = graph.create_node();
    graph.set_array(n, 4);
    graph.set_array(n, 4);
    assert!(!graph.is_collapsed(n));

    graph.set_array(n, 6);
    assert!(graph.is_collapsed(n));
}

#[test]
fn test_reasserting_array_flag_keeps_fields() {
    let mut graph = Graph::new();
    let n = graph.create_node();
    graph.set_array(n, 4);
    graph.add_type(n, 0, Type::Int(64));
    graph.add_type(n, 2, Type::Int(8));
    assert_eq!(graph.size(n), 8);

    graph.set_attribute(n, NodeFlags::ARRAY, true);

    let node = graph.node(n);
    assert!(!node.is_collapsed());
    assert_eq!(node.stride(), Some(4));
    assert_eq!(node.types().count(), 2);
    assert!(graph.type_set_contains(graph.get_type(n, 2).unwrap(), &Type::Int(8)));
    assert!(!graph.type_set_contains(graph.get_type(n, 0).unwrap(), &Type::Int(8)));
}

#[test]
fn test_array_wraps_at_stride_after_growth() {
    let mut graph = Graph::new();
    let n = graph.create_node();
    graph.set_array(n, 4);
    graph.grow_size(n, 6);

    let node = graph.node(n);
    assert_eq!(node.size(), 6);
    assert_eq!(node.adjust_offset(7), 3);
    assert_eq!(node.adjust_offset(1), node.adjust_offset(5));
}
